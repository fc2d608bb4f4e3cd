//! Service provider settings.
//!
//! Trust in the identity provider is configured either with its signing
//! certificate or with the SHA-1 fingerprint of that certificate.

use kc_crypto::{normalize_fingerprint, Certificate};
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};

/// Identity provider trust configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// IdP signing certificate, PEM or bare base64 DER.
    pub idp_cert: Option<String>,
    /// SHA-1 fingerprint of the IdP signing certificate (hex, colons optional).
    pub idp_cert_fingerprint: Option<String>,
}

impl Settings {
    /// Trusts the given certificate.
    #[must_use]
    pub fn with_idp_cert(mut self, pem: impl Into<String>) -> Self {
        self.idp_cert = Some(pem.into());
        self
    }

    /// Trusts certificates with the given fingerprint.
    #[must_use]
    pub fn with_idp_cert_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.idp_cert_fingerprint = Some(fingerprint.into());
        self
    }

    /// Resolves the configured trust anchor. A certificate takes precedence
    /// over a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if nothing is configured or the
    /// certificate cannot be parsed.
    pub fn trust_anchor(&self) -> SamlResult<TrustAnchor> {
        if let Some(pem) = self.idp_cert.as_deref().filter(|p| !p.trim().is_empty()) {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| SamlError::Configuration(format!("idp_cert: {e}")))?;
            return Ok(TrustAnchor::Certificate(cert));
        }
        if let Some(fingerprint) = self
            .idp_cert_fingerprint
            .as_deref()
            .filter(|f| !f.trim().is_empty())
        {
            return Ok(TrustAnchor::Fingerprint(normalize_fingerprint(fingerprint)));
        }
        Err(SamlError::Configuration(
            "neither idp_cert nor idp_cert_fingerprint is configured".to_string(),
        ))
    }

    /// Returns the normalized fingerprint of the trusted IdP certificate.
    ///
    /// # Errors
    ///
    /// Same as [`Settings::trust_anchor`].
    pub fn idp_fingerprint(&self) -> SamlResult<String> {
        Ok(match self.trust_anchor()? {
            TrustAnchor::Certificate(cert) => normalize_fingerprint(&cert.fingerprint()),
            TrustAnchor::Fingerprint(fingerprint) => fingerprint,
        })
    }
}

/// What a signature must chain to in order to be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustAnchor {
    /// Verify with this certificate's public key.
    Certificate(Certificate),
    /// Verify with the embedded certificate, whose normalized fingerprint must match.
    Fingerprint(String),
}

/// Switches for the validation pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Skip the protocol schema check.
    pub skip_structure: bool,
    /// Skip the `NotBefore`/`NotOnOrAfter` check.
    pub skip_conditions: bool,
    /// Tolerated clock skew in seconds, applied to both condition bounds.
    pub allowed_clock_drift_secs: u32,
}
