//! Input decoding integration tests.

use base64::Engine;
use kc_saml_sp::{Response, SamlError};

use crate::common::{trusted_settings, ResponseBuilder};

/// Empty input is refused before any parsing.
#[test]
fn test_empty_input_rejected() {
    for raw in ["", "   \n\t"] {
        let result = Response::new(raw, trusted_settings());
        assert!(
            matches!(result, Err(SamlError::InvalidArgument(_))),
            "input {raw:?}: {result:?}"
        );
    }
}

/// The base64 `SAMLResponse` form value is accepted as is.
#[test]
fn test_base64_form_value() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed()?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&xml);

    let mut response = Response::new(&encoded, trusted_settings())?;
    assert_eq!(response.raw(), encoded.as_bytes());
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    assert_eq!(response.name_id(), Some("jdoe@example.org"));
    Ok(())
}

/// Line-wrapped base64, as some form encoders emit it, decodes too.
#[test]
fn test_line_wrapped_base64() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed()?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&xml);
    let wrapped = encoded
        .as_bytes()
        .chunks(76)
        .map(|line| std::str::from_utf8(line).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\r\n");

    let mut response = Response::new(&wrapped, trusted_settings())?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    Ok(())
}

/// Garbage that is neither XML nor base64 fails construction.
#[test]
fn test_garbage_input_rejected() {
    assert!(matches!(
        Response::new("not base64 at all!", trusted_settings()),
        Err(SamlError::Base64Decode(_))
    ));
    assert!(matches!(
        Response::new("<samlp:Response", trusted_settings()),
        Err(SamlError::XmlParse(_))
    ));
}

/// A document type declaration is never accepted.
#[test]
fn test_doctype_rejected() {
    let xml = r#"<!DOCTYPE Response [<!ENTITY x "y">]><samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"/>"#;
    assert!(Response::new(xml, trusted_settings()).is_err());
}
