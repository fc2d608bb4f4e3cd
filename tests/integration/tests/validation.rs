//! Validation pipeline integration tests.
//!
//! Structure, digest, signature and condition checks run through
//! `Response::is_valid` exactly as an assertion consumer endpoint calls them.

use chrono::{Duration, Utc};
use kc_saml_sp::{ErrorKind, Response, Settings, ValidationOptions};

use crate::common::{
    init_tracing, trusted_settings, ResponseBuilder, EC_CERT, IDP_FINGERPRINT, ROGUE_CERT,
    ROGUE_KEY,
};

/// A freshly signed response with a current window validates cleanly.
#[test]
fn test_signed_response_is_valid() -> anyhow::Result<()> {
    init_tracing();
    let xml = ResponseBuilder::default().signed()?;

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    assert!(response.validation_errors().is_empty());
    Ok(())
}

/// An assertion without `Conditions` is not time-bounded.
#[test]
fn test_missing_conditions_pass() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().without_conditions().signed()?;

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    assert!(response.conditions().is_none());
    Ok(())
}

/// A `NotBefore` in the future fails with the exact condition message.
#[test]
fn test_not_yet_valid_assertion() -> anyhow::Result<()> {
    let now = Utc::now();
    let xml = ResponseBuilder::default()
        .conditions(now + Duration::hours(1), now + Duration::hours(2))
        .signed()?;

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(!response.is_valid());

    let errors = response.validation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::InvalidCondition);
    assert_eq!(errors[0].message, "current time precedes NotBefore");
    Ok(())
}

/// A `NotOnOrAfter` in the past fails with the exact condition message.
#[test]
fn test_expired_assertion() -> anyhow::Result<()> {
    let now = Utc::now();
    let xml = ResponseBuilder::default()
        .conditions(now - Duration::hours(2), now - Duration::hours(1))
        .signed()?;

    let mut response = Response::new(&xml, trusted_settings())?;
    let error = response.validate_strict().unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidCondition);
    assert_eq!(error.message, "current time is on or after NotOnOrAfter");
    assert_eq!(response.validation_errors(), [error]);
    Ok(())
}

/// Allowed clock drift widens both bounds.
#[test]
fn test_clock_drift_tolerance() -> anyhow::Result<()> {
    let now = Utc::now();
    let xml = ResponseBuilder::default()
        .conditions(now + Duration::seconds(30), now + Duration::minutes(10))
        .signed()?;

    let mut strict = Response::new(&xml, trusted_settings())?;
    assert!(!strict.is_valid());

    let options = ValidationOptions {
        allowed_clock_drift_secs: 120,
        ..ValidationOptions::default()
    };
    let mut lenient = Response::new(&xml, trusted_settings())?.with_options(options);
    assert!(lenient.is_valid(), "errors: {:?}", lenient.validation_errors());
    Ok(())
}

/// Conditions can be switched off entirely.
#[test]
fn test_skip_conditions() -> anyhow::Result<()> {
    let now = Utc::now();
    let xml = ResponseBuilder::default()
        .conditions(now - Duration::hours(2), now - Duration::hours(1))
        .signed()?;

    let options = ValidationOptions {
        skip_conditions: true,
        ..ValidationOptions::default()
    };
    let mut response = Response::new(&xml, trusted_settings())?.with_options(options);
    assert!(response.is_valid());
    Ok(())
}

/// Editing signed content after signing breaks the reference digest.
#[test]
fn test_tampered_assertion_fails_digest() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default()
        .signed()?
        .replace(
            "jdoe@example.org</saml:NameID>",
            "admin@example.org</saml:NameID>",
        );

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(!response.is_valid());
    assert_eq!(response.validation_errors()[0].kind, ErrorKind::InvalidDigest);
    Ok(())
}

/// Editing the signature value breaks the signature check.
#[test]
fn test_tampered_signature_value() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed()?;
    let marker = "<ds:SignatureValue>";
    let at = xml.find(marker).expect("signature value") + marker.len() + 10;
    let replacement = if &xml[at..=at] == "A" { "B" } else { "A" };
    let tampered = format!("{}{}{}", &xml[..at], replacement, &xml[at + 1..]);

    let mut response = Response::new(&tampered, trusted_settings())?;
    assert!(!response.is_valid());
    let errors = response.validation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::InvalidSignature);
    Ok(())
}

/// A signature by an untrusted key is rejected.
#[test]
fn test_rogue_signer_rejected() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed_by(ROGUE_KEY, ROGUE_CERT)?;

    let mut by_cert = Response::new(&xml, trusted_settings())?;
    assert!(!by_cert.is_valid());
    assert_eq!(by_cert.validation_errors()[0].kind, ErrorKind::InvalidSignature);

    let fingerprint = Settings::default().with_idp_cert_fingerprint(IDP_FINGERPRINT);
    let mut by_fingerprint = Response::new(&xml, fingerprint)?;
    assert!(!by_fingerprint.is_valid());
    assert_eq!(
        by_fingerprint.validation_errors()[0].kind,
        ErrorKind::InvalidSignature
    );
    Ok(())
}

/// An ECDSA P-256 signature verifies against the identity provider's EC certificate.
#[test]
fn test_ecdsa_signed_response() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().ec_signed()?;
    assert!(xml.contains("xmldsig-more#ecdsa-sha256"));

    let mut response = Response::new(&xml, Settings::default().with_idp_cert(EC_CERT))?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    assert_eq!(response.name_id(), Some("jdoe@example.org"));

    let mut wrong_key = Response::new(&xml, trusted_settings())?;
    assert!(!wrong_key.is_valid());
    assert_eq!(wrong_key.validation_errors()[0].kind, ErrorKind::InvalidSignature);
    Ok(())
}

/// An unparseable trusted certificate is named in the signature error.
#[test]
fn test_unusable_idp_certificate() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed()?;

    let broken = "-----BEGIN CERTIFICATE-----\n!!\n-----END CERTIFICATE-----";
    let settings = Settings::default().with_idp_cert(broken);
    let mut response = Response::new(&xml, settings)?;
    let error = response.validate_strict().unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidSignature);
    assert!(error.message.contains("idp_cert"), "{}", error.message);
    Ok(())
}

/// The embedded certificate is trusted when its fingerprint matches.
#[test]
fn test_fingerprint_trust() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed()?;

    let settings = Settings::default().with_idp_cert_fingerprint(IDP_FINGERPRINT.to_lowercase());
    let mut response = Response::new(&xml, settings)?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    Ok(())
}

/// With neither a certificate nor a fingerprint nothing can be trusted.
#[test]
fn test_missing_trust_anchor() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().signed()?;

    let mut response = Response::new(&xml, Settings::default())?;
    let error = response.validate_strict().unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidSignature);
    Ok(())
}

/// A response with no signature at all never validates.
#[test]
fn test_unsigned_response_rejected() -> anyhow::Result<()> {
    let xml = ResponseBuilder::default().build();

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(!response.is_valid());
    assert_eq!(response.validation_errors().len(), 1);
    Ok(())
}

/// Schema violations are reported before any cryptographic check.
#[test]
fn test_structure_violation_and_skip() -> anyhow::Result<()> {
    let builder = ResponseBuilder::default();
    let status = format!(
        r#"<samlp:Status><samlp:StatusCode Value="{}"/></samlp:Status>"#,
        builder.status
    );
    let xml = builder.signed()?.replace(&status, "");

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(!response.is_valid());
    let errors = response.validation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::InvalidStructure);
    assert!(errors[0].message.contains("Status"), "{}", errors[0].message);

    let options = ValidationOptions {
        skip_structure: true,
        ..ValidationOptions::default()
    };
    let mut skipped = Response::new(&xml, trusted_settings())?.with_options(options);
    assert!(skipped.is_valid(), "errors: {:?}", skipped.validation_errors());
    Ok(())
}

/// Repeated validation yields the same outcome and error log.
#[test]
fn test_validation_is_idempotent() -> anyhow::Result<()> {
    let now = Utc::now();
    let xml = ResponseBuilder::default()
        .conditions(now - Duration::hours(2), now - Duration::hours(1))
        .signed()?;

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(!response.is_valid());
    let first = response.validation_errors().to_vec();
    assert!(!response.is_valid());
    assert_eq!(response.validation_errors(), first.as_slice());
    assert_eq!(first.len(), 1);
    Ok(())
}

/// A signature over the whole Response covers its assertion too.
#[test]
fn test_response_level_signature() -> anyhow::Result<()> {
    let builder = ResponseBuilder::default();
    let xml = builder.response_signed()?;

    let mut response = Response::new(&xml, trusted_settings())?;
    assert!(response.is_valid(), "errors: {:?}", response.validation_errors());
    assert_eq!(response.signed_element_id(), Some(builder.response_id.clone()));
    assert_eq!(response.name_id(), Some("jdoe@example.org"));
    Ok(())
}

