//! X.509 certificate utilities.
//!
//! Identity providers publish their signing certificate either as a PEM
//! document or as the bare base64 body found in SAML metadata
//! (`<ds:X509Certificate>`). Service providers may alternatively pin the
//! certificate by its SHA-1 fingerprint.

use base64::Engine;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::hash::sha1;
use crate::signature::SignatureError;

/// Public key algorithm family of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA public key.
    Rsa,
    /// Elliptic curve public key.
    Ec,
}

/// Raw public key material extracted from a certificate.
#[derive(Debug, Clone)]
pub struct PublicKeyInfo {
    /// Key algorithm family.
    pub kind: KeyKind,
    /// For RSA the PKCS#1 `RSAPublicKey` DER; for EC the uncompressed point.
    pub der: Vec<u8>,
}

/// A parsed-once, DER-backed X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Creates a certificate from DER bytes, checking that they parse.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a DER-encoded X.509 certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self, SignatureError> {
        X509Certificate::from_der(&der).map_err(|e| {
            SignatureError::InvalidCertificate(format!("Failed to parse certificate: {e}"))
        })?;
        Ok(Self { der })
    }

    /// Creates a certificate from PEM text or a bare base64 DER body.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be decoded or does not contain a certificate.
    pub fn from_pem(text: &str) -> Result<Self, SignatureError> {
        let der = if text.contains("-----BEGIN") {
            pem_to_der(text, "CERTIFICATE").ok_or_else(|| {
                SignatureError::InvalidCertificate("Invalid certificate PEM".to_string())
            })?
        } else {
            let body: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(body)
                .map_err(|e| {
                    SignatureError::InvalidCertificate(format!("Invalid certificate encoding: {e}"))
                })?
        };
        Self::from_der(der)
    }

    /// Returns the DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the colon-delimited uppercase hex SHA-1 fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        certificate_fingerprint(&self.der)
    }

    /// Returns the subject distinguished name.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed.
    pub fn subject(&self) -> Result<String, SignatureError> {
        let (_, cert) = self.parse()?;
        Ok(cert.subject().to_string())
    }

    /// Extracts the public key for signature verification.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed or carries an
    /// unsupported key type.
    pub fn public_key(&self) -> Result<PublicKeyInfo, SignatureError> {
        let (_, cert) = self.parse()?;
        let spki = cert.public_key();
        let kind = match spki.parsed() {
            Ok(PublicKey::RSA(_)) => KeyKind::Rsa,
            Ok(PublicKey::EC(_)) => KeyKind::Ec,
            Ok(_) => {
                return Err(SignatureError::UnsupportedAlgorithm(
                    "certificate key is neither RSA nor EC".to_string(),
                ));
            }
            Err(e) => {
                return Err(SignatureError::InvalidKey(format!("Failed to parse public key: {e}")));
            }
        };

        Ok(PublicKeyInfo {
            kind,
            der: spki.subject_public_key.data.to_vec(),
        })
    }

    fn parse(&self) -> Result<(&[u8], X509Certificate<'_>), SignatureError> {
        X509Certificate::from_der(&self.der).map_err(|e| {
            SignatureError::InvalidCertificate(format!("Failed to parse certificate: {e}"))
        })
    }
}

/// Extracts DER data from a PEM string.
#[must_use]
pub fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let end_pos = pem.find(&end)?;
    if end_pos < start {
        return None;
    }

    let b64_data: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD.decode(&b64_data).ok()
}

/// Computes the colon-delimited uppercase hex SHA-1 fingerprint of DER bytes.
#[must_use]
pub fn certificate_fingerprint(der: &[u8]) -> String {
    sha1(der)
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Normalizes a configured fingerprint to the colon-delimited uppercase form.
///
/// Accepts any case, with or without `:` separators or surrounding whitespace.
#[must_use]
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    let hex: Vec<char> = fingerprint
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    hex.chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}
