//! ECDSA signature verification.
//!
//! XML-DSig encodes ECDSA signature values as the fixed-width concatenation
//! `r || s` (RFC 4050), not as an ASN.1 `Ecdsa-Sig-Value`.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING,
        ECDSA_P384_SHA384_FIXED, ECDSA_P384_SHA384_FIXED_SIGNING, ECDSA_P521_SHA512_FIXED,
        ECDSA_P521_SHA512_FIXED_SIGNING,
    },
};

use crate::signature::SignatureError;

/// ECDSA algorithms, each paired with its conventional curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaAlgorithm {
    /// ECDSA P-256 with SHA-256.
    Es256,
    /// ECDSA P-384 with SHA-384.
    Es384,
    /// ECDSA P-521 with SHA-512.
    Es512,
}

/// Signs data with an ECDSA private key, producing a fixed-width signature.
///
/// # Arguments
///
/// * `pkcs8_der` - EC private key in PKCS#8 DER format
/// * `data` - Data to sign
/// * `algorithm` - Signature algorithm; the key must be on its curve
///
/// # Errors
///
/// Returns an error if the key cannot be parsed for the algorithm's curve or
/// signing fails.
pub fn ecdsa_sign(
    pkcs8_der: &[u8],
    data: &[u8],
    algorithm: EcdsaAlgorithm,
) -> Result<Vec<u8>, SignatureError> {
    let signing_alg = match algorithm {
        EcdsaAlgorithm::Es256 => &ECDSA_P256_SHA256_FIXED_SIGNING,
        EcdsaAlgorithm::Es384 => &ECDSA_P384_SHA384_FIXED_SIGNING,
        EcdsaAlgorithm::Es512 => &ECDSA_P521_SHA512_FIXED_SIGNING,
    };

    let key_pair = EcdsaKeyPair::from_pkcs8(signing_alg, pkcs8_der)
        .map_err(|e| SignatureError::InvalidKey(format!("Invalid ECDSA PKCS#8 key: {e}")))?;

    let rng = SystemRandom::new();
    let signature = key_pair
        .sign(&rng, data)
        .map_err(|e| SignatureError::Signing(format!("ECDSA signing failed: {e}")))?;

    Ok(signature.as_ref().to_vec())
}

/// Verifies a fixed-width ECDSA signature.
///
/// # Arguments
///
/// * `public_point` - Uncompressed EC public point from the certificate
/// * `data` - Original data that was signed
/// * `sig` - `r || s` signature value
/// * `algorithm` - Signature algorithm
///
/// # Errors
///
/// Verification failures are reported as `Ok(false)`.
pub fn ecdsa_verify(
    public_point: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: EcdsaAlgorithm,
) -> Result<bool, SignatureError> {
    let public_key = match algorithm {
        EcdsaAlgorithm::Es256 => UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_point),
        EcdsaAlgorithm::Es384 => UnparsedPublicKey::new(&ECDSA_P384_SHA384_FIXED, public_point),
        EcdsaAlgorithm::Es512 => UnparsedPublicKey::new(&ECDSA_P521_SHA512_FIXED, public_point),
    };

    Ok(public_key.verify(data, sig).is_ok())
}
