//! Claim extraction integration tests.
//!
//! Claims must come from the assertion the signature covers, never from a
//! sibling an attacker slipped into the Response.

use kc_saml_sp::{status_codes, xbox_claims, ErrorKind, Response, Symbol};

use crate::common::{new_id, trusted_settings, ResponseBuilder};

/// Inserts `extra` in front of the first assertion of `xml`.
fn insert_before_assertion(xml: &str, extra: &str) -> String {
    let at = xml.find("<saml:Assertion").expect("assertion");
    format!("{}{extra}\n  {}", &xml[..at], &xml[at..])
}

fn forged() -> ResponseBuilder {
    let mut forged = ResponseBuilder::default();
    forged.name_id = "admin@evil.example".to_string();
    forged.attributes = vec![(
        "eduPersonPrincipalName".to_string(),
        "attacker@evil.example".to_string(),
    )];
    forged
}

/// Basic claims of a valid response.
#[test]
fn test_claims_of_signed_assertion() -> anyhow::Result<()> {
    let builder = ResponseBuilder::default();
    let mut response = Response::new(builder.signed()?, trusted_settings())?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());

    assert_eq!(response.name_id(), Some("jdoe@example.org"));
    assert_eq!(response.session_index(), Some(builder.session_index.as_str()));
    assert_eq!(response.issuer(), Some(crate::common::IDP_ENTITY_ID));
    assert!(response.success_status());
    assert_eq!(response.attributes().get("mail"), Some("john.doe@example.org"));
    Ok(())
}

/// Attributes are reachable by literal name and by interned symbol.
#[test]
fn test_attribute_lookup_by_literal_and_symbol() -> anyhow::Result<()> {
    let response = Response::new(ResponseBuilder::default().signed()?, trusted_settings())?;

    let attributes = response.attributes();
    assert_eq!(attributes.get("eduPersonPrincipalName"), Some("jdoe@example.org"));
    assert_eq!(
        attributes.get(&Symbol::intern("eduPersonPrincipalName")),
        Some("jdoe@example.org")
    );
    assert_eq!(attributes.len(), 2);
    Ok(())
}

/// An unsigned assertion placed before the signed one is ignored.
#[test]
fn test_wrapped_unsigned_assertion_is_ignored() -> anyhow::Result<()> {
    let signed = ResponseBuilder::default().signed()?;
    let xml = insert_before_assertion(&signed, &forged().assertion());

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    assert_eq!(response.name_id(), Some("jdoe@example.org"));
    assert_eq!(
        response.attributes().get("eduPersonPrincipalName"),
        Some("jdoe@example.org")
    );
    Ok(())
}

/// A forged assertion reusing the signed ID makes the reference ambiguous.
#[test]
fn test_duplicate_assertion_id_is_rejected() -> anyhow::Result<()> {
    let builder = ResponseBuilder::default();
    let signed = builder.signed()?;
    let mut clone = forged();
    clone.assertion_id = builder.assertion_id.clone();
    let xml = insert_before_assertion(&signed, &clone.assertion());

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(!response.is_valid());
    assert_eq!(response.validation_errors()[0].kind, ErrorKind::InvalidDigest);
    Ok(())
}

/// An unsigned response has no signed assertion and so no assertion claims.
#[test]
fn test_unsigned_response_has_no_assertion_claims() -> anyhow::Result<()> {
    let response = Response::new(ResponseBuilder::default().build(), trusted_settings())?;

    assert_eq!(response.signed_element_id(), None);
    assert_eq!(response.name_id(), None);
    assert!(response.attributes().is_empty());
    assert_eq!(response.issuer(), Some(crate::common::IDP_ENTITY_ID));
    assert!(response.success_status());
    Ok(())
}

/// A non-success status is reported even when the response validates.
#[test]
fn test_responder_status() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default()
        .status(status_codes::RESPONDER)
        .signed()?;

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(response.is_valid());
    assert!(!response.success_status());
    let status = response.status().expect("status");
    assert_eq!(status.status_code.value, status_codes::RESPONDER);
    Ok(())
}

/// Xbox Live claims are projected from their attribute names.
#[test]
fn test_xbox_claims() -> anyhow::Result<()> {
    let mut builder = ResponseBuilder::default();
    builder.attributes = vec![
        (xbox_claims::GAMER_TAG.to_string(), "MasterChief".to_string()),
        (xbox_claims::PXUID.to_string(), new_id()),
    ];
    let response = Response::new(builder.signed()?, trusted_settings())?;

    let claims = response.xbox_claims();
    assert_eq!(claims.gamer_tag.as_deref(), Some("MasterChief"));
    assert!(claims.pxuid.is_some());
    assert_eq!(claims.tier, None);
    Ok(())
}

/// Claims read before validation stay memoized whatever validation decides.
#[test]
fn test_claims_are_memoized_across_validation() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed()?.replace(
        "jdoe@example.org</saml:NameID>",
        "admin@example.org</saml:NameID>",
    );

    let mut response = Response::new(&xml, trusted_settings())?;
    let before: *const _ = response.attributes();
    assert_eq!(response.name_id(), Some("admin@example.org"));

    assert!(!response.is_valid());
    assert_eq!(response.validation_errors()[0].kind, ErrorKind::InvalidDigest);

    // Validation outcome does not gate access; callers must check it.
    assert_eq!(response.name_id(), Some("admin@example.org"));
    assert!(std::ptr::eq(before, response.attributes()));
    Ok(())
}
