//! Legacy cryptographic operations for protocol compatibility.
//!
//! **WARNING**: The algorithms in this module are provided for interoperability
//! with SAML 2.0 identity providers, which overwhelmingly sign with
//! RSA PKCS#1 v1.5 over SHA-256 (and, for older deployments, SHA-1).
//!
//! ## When to use these algorithms
//!
//! - Verifying XML-DSig signatures on SAML responses and assertions
//! - Producing signed fixtures for SAML interoperability tests
//!
//! ## When NOT to use these algorithms
//!
//! - New token formats should use RS384/RS512/ES384/ES512
//! - SHA-1 is never available for signing

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, RsaKeyPair},
};

use crate::signature::SignatureError;

/// Legacy RSA signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyRsaAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-1 (verification only).
    Rs1,
    /// RSA PKCS#1 v1.5 with SHA-256.
    Rs256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    Rs384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    Rs512,
}

impl LegacyRsaAlgorithm {
    /// Returns the JWA-style algorithm name.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::Rs1 => "RS1",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
        }
    }

    /// Returns the XML-DSig algorithm URI.
    #[must_use]
    pub const fn xml_dsig_uri(self) -> &'static str {
        match self {
            Self::Rs1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            Self::Rs256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::Rs384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::Rs512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        }
    }

    /// Returns true if this algorithm may be used to create signatures.
    #[must_use]
    pub const fn can_sign(self) -> bool {
        !matches!(self, Self::Rs1)
    }
}

/// Signs data using RSA with legacy algorithm support.
///
/// # Arguments
///
/// * `key_der` - RSA private key in DER format (PKCS#1 or PKCS#8)
/// * `data` - Data to sign
/// * `algorithm` - Signature algorithm
///
/// # Errors
///
/// Returns an error if the key cannot be parsed, the algorithm cannot be used
/// for signing, or signing fails.
pub fn rsa_sign_legacy(
    key_der: &[u8],
    data: &[u8],
    algorithm: LegacyRsaAlgorithm,
) -> Result<Vec<u8>, SignatureError> {
    let padding = match algorithm {
        LegacyRsaAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
        LegacyRsaAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
        LegacyRsaAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
        LegacyRsaAlgorithm::Rs1 => {
            return Err(SignatureError::UnsupportedAlgorithm(
                "RSA-SHA1 signing is not supported".to_string(),
            ));
        }
    };

    let key_pair = RsaKeyPair::from_der(key_der)
        .or_else(|_| RsaKeyPair::from_pkcs8(key_der))
        .map_err(|e| SignatureError::InvalidKey(format!("Invalid RSA key: {e}")))?;

    let rng = SystemRandom::new();
    let mut signature = vec![0u8; key_pair.public_modulus_len()];

    key_pair
        .sign(padding, &rng, data, &mut signature)
        .map_err(|e| SignatureError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(signature)
}

/// Verifies an RSA signature with legacy algorithm support.
///
/// # Arguments
///
/// * `public_key_der` - RSA public key in DER format (PKCS#1 `RSAPublicKey`)
/// * `data` - Original data that was signed
/// * `sig` - Signature to verify
/// * `algorithm` - Signature algorithm
///
/// # Errors
///
/// Verification failures are reported as `Ok(false)`; errors are reserved
/// for future key-format checks.
pub fn rsa_verify_legacy(
    public_key_der: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: LegacyRsaAlgorithm,
) -> Result<bool, SignatureError> {
    use aws_lc_rs::signature::{
        UnparsedPublicKey, RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA384, RSA_PKCS1_2048_8192_SHA512,
    };

    let verification_alg: &dyn signature::VerificationAlgorithm = match algorithm {
        LegacyRsaAlgorithm::Rs1 => &RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        LegacyRsaAlgorithm::Rs256 => &RSA_PKCS1_2048_8192_SHA256,
        LegacyRsaAlgorithm::Rs384 => &RSA_PKCS1_2048_8192_SHA384,
        LegacyRsaAlgorithm::Rs512 => &RSA_PKCS1_2048_8192_SHA512,
    };

    let public_key = UnparsedPublicKey::new(verification_alg, public_key_der);

    match public_key.verify(data, sig) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
