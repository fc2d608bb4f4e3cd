//! SAML error types.
//!
//! Two families of errors exist:
//!
//! - [`SamlError`] covers construction, parsing, configuration and the
//!   signed-document collaborator. Construction-time errors are always
//!   propagated to the caller.
//! - [`ValidationError`] is a single entry of a response's validation log,
//!   typed by the closed [`ErrorKind`] set.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML service provider errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Invalid argument supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid SAML response format or content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// A reference digest does not match the signed content.
    #[error("digest mismatch: {0}")]
    DigestMismatch(String),

    /// XML signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Trust configuration is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl SamlError {
    /// Returns the HTTP status code an assertion consumer endpoint should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_)
            | Self::InvalidResponse(_)
            | Self::XmlParse(_)
            | Self::Base64Decode(_) => 400,
            Self::DigestMismatch(_) | Self::SignatureInvalid(_) => 401,
            _ => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for SamlError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<std::str::Utf8Error> for SamlError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::XmlParse(format!("invalid UTF-8: {err}"))
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<kc_crypto::SignatureError> for SamlError {
    fn from(err: kc_crypto::SignatureError) -> Self {
        Self::Crypto(err.to_string())
    }
}

/// Kind of a recorded validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The document does not conform to the SAML protocol schema.
    InvalidStructure,
    /// A reference digest does not match the signed content.
    InvalidDigest,
    /// The signature value does not verify against the trusted certificate.
    InvalidSignature,
    /// The assertion is outside its `NotBefore`/`NotOnOrAfter` window.
    InvalidCondition,
}

impl ErrorKind {
    /// Returns the stable snake_case identifier used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidStructure => "invalid_structure",
            Self::InvalidDigest => "invalid_digest",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidCondition => "invalid_condition",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation failure: its kind and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind}: {message}")]
pub struct ValidationError {
    /// The failure kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
