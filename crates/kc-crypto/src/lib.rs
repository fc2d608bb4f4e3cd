//! # kc-crypto
//!
//! Cryptographic operations for Keycloak Rust SAML service providers using aws-lc-rs.
//!
//! ## Scope
//!
//! - Message digests used by XML-DSig references (SHA-1 legacy, SHA-2 family)
//! - RSA PKCS#1 v1.5 signing and verification
//! - ECDSA signing and verification for XML-DSig `ecdsa-sha*` signature methods
//! - X.509 certificate handling: PEM decoding, fingerprints, public key extraction
//!
//! SHA-1 is accepted for *verification* only, because identity providers
//! still emit `rsa-sha1` signed assertions. It is never used for signing.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod certificate;
pub mod ecdsa;
pub mod hash;
pub mod legacy;
pub mod signature;

pub use certificate::{
    certificate_fingerprint, normalize_fingerprint, pem_to_der, Certificate, KeyKind,
};
pub use ecdsa::{ecdsa_sign, ecdsa_verify, EcdsaAlgorithm};
pub use hash::{digest, sha1, sha256, sha384, sha512, DigestAlgorithm};
pub use legacy::{rsa_sign_legacy, rsa_verify_legacy, LegacyRsaAlgorithm};
pub use signature::SignatureError;
