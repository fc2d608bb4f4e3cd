//! XML Signature support for SAML.
//!
//! This module provides XML Digital Signature (XML-DSig) support for
//! verifying enveloped signatures on SAML responses and assertions, and an
//! enveloped signer used to produce such documents.
//!
//! # Signing Algorithms
//!
//! The following signature algorithms are verified:
//! - RSA-SHA256 (recommended)
//! - RSA-SHA384
//! - RSA-SHA512
//! - ECDSA-SHA256
//! - ECDSA-SHA384
//! - ECDSA-SHA512
//!
//! Legacy RSA-SHA1 is accepted for verification only.

mod c14n;
mod signed_document;
mod signer;

pub use c14n::canonicalize;
pub use signed_document::*;
pub use signer::*;

use kc_crypto::{DigestAlgorithm, EcdsaAlgorithm, LegacyRsaAlgorithm};

use crate::document::Node;
use crate::error::{SamlError, SamlResult};
use crate::types::{
    canonicalization_algorithms, digest_algorithms, signature_algorithms, XMLDSIG_NS,
};

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256 (recommended).
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA with SHA-256.
    EcdsaSha256,
    /// ECDSA with SHA-384.
    EcdsaSha384,
    /// ECDSA with SHA-512.
    EcdsaSha512,
    /// Legacy RSA with SHA-1 (verification only).
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
            Self::EcdsaSha256 => signature_algorithms::ECDSA_SHA256,
            Self::EcdsaSha384 => signature_algorithms::ECDSA_SHA384,
            Self::EcdsaSha512 => signature_algorithms::ECDSA_SHA512,
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
        }
    }

    /// Returns the corresponding digest algorithm URI.
    #[must_use]
    pub const fn digest_uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 | Self::EcdsaSha256 => digest_algorithms::SHA256,
            Self::RsaSha384 | Self::EcdsaSha384 => digest_algorithms::SHA384,
            Self::RsaSha512 | Self::EcdsaSha512 => digest_algorithms::SHA512,
            Self::RsaSha1 => digest_algorithms::SHA1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            signature_algorithms::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            signature_algorithms::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            signature_algorithms::ECDSA_SHA512 => Some(Self::EcdsaSha512),
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns true if this algorithm uses RSA.
    #[must_use]
    pub const fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512 | Self::RsaSha1
        )
    }

    /// Returns true if this algorithm uses ECDSA.
    #[must_use]
    pub const fn is_ecdsa(&self) -> bool {
        matches!(
            self,
            Self::EcdsaSha256 | Self::EcdsaSha384 | Self::EcdsaSha512
        )
    }

    /// Returns true if this algorithm uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::RsaSha1)
    }

    /// Returns the kc-crypto RSA algorithm, if this is an RSA algorithm.
    #[must_use]
    pub const fn rsa(&self) -> Option<LegacyRsaAlgorithm> {
        match self {
            Self::RsaSha1 => Some(LegacyRsaAlgorithm::Rs1),
            Self::RsaSha256 => Some(LegacyRsaAlgorithm::Rs256),
            Self::RsaSha384 => Some(LegacyRsaAlgorithm::Rs384),
            Self::RsaSha512 => Some(LegacyRsaAlgorithm::Rs512),
            _ => None,
        }
    }

    /// Returns the kc-crypto ECDSA algorithm, if this is an ECDSA algorithm.
    #[must_use]
    pub const fn ecdsa(&self) -> Option<EcdsaAlgorithm> {
        match self {
            Self::EcdsaSha256 => Some(EcdsaAlgorithm::Es256),
            Self::EcdsaSha384 => Some(EcdsaAlgorithm::Es384),
            Self::EcdsaSha512 => Some(EcdsaAlgorithm::Es512),
            _ => None,
        }
    }
}

/// Maps a `DigestMethod` URI to a digest algorithm.
#[must_use]
pub fn digest_algorithm_from_uri(uri: &str) -> Option<DigestAlgorithm> {
    match uri {
        digest_algorithms::SHA1 => Some(DigestAlgorithm::Sha1),
        digest_algorithms::SHA256 => Some(DigestAlgorithm::Sha256),
        digest_algorithms::SHA384 => Some(DigestAlgorithm::Sha384),
        digest_algorithms::SHA512 => Some(DigestAlgorithm::Sha512),
        _ => None,
    }
}

/// Canonicalization algorithm selection.
///
/// Only exclusive canonicalization is supported. Comments are never part of
/// the parsed document model, so both variants produce the same output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanonicalizationAlgorithm {
    /// Exclusive C14N without comments (recommended).
    #[default]
    ExclusiveC14N,
    /// Exclusive C14N with comments.
    ExclusiveC14NWithComments,
}

impl CanonicalizationAlgorithm {
    /// Returns the URI for this canonicalization algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::ExclusiveC14N => canonicalization_algorithms::EXCLUSIVE_C14N,
            Self::ExclusiveC14NWithComments => {
                canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS
            }
        }
    }

    /// Parses a canonicalization algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            canonicalization_algorithms::EXCLUSIVE_C14N => Some(Self::ExclusiveC14N),
            canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS => {
                Some(Self::ExclusiveC14NWithComments)
            }
            _ => None,
        }
    }
}

/// XML Signature structure.
///
/// Represents a `<ds:Signature>` element of a parsed document. Algorithm
/// URIs are kept verbatim so that unsupported values can be reported by the
/// check that needs them.
#[derive(Debug, Clone)]
pub struct XmlSignature<'d> {
    /// The `ds:Signature` element.
    pub element: Node<'d>,
    /// The `ds:SignedInfo` element.
    pub signed_info: Node<'d>,
    /// `CanonicalizationMethod` algorithm URI.
    pub canonicalization_uri: String,
    /// `SignatureMethod` algorithm URI.
    pub signature_method_uri: String,
    /// The reference URI (typically `#` followed by the ID of the signed element).
    pub reference_uri: String,
    /// Transform algorithm URIs of the reference, in order.
    pub transforms: Vec<String>,
    /// Non-empty `InclusiveNamespaces PrefixList` of a reference transform.
    pub transform_prefix_list: Option<String>,
    /// Non-empty `InclusiveNamespaces PrefixList` of `CanonicalizationMethod`.
    pub canonicalization_prefix_list: Option<String>,
    /// `DigestMethod` algorithm URI.
    pub digest_method_uri: String,
    /// The digest value (base64 encoded).
    pub digest_value: String,
    /// The signature value (base64 encoded).
    pub signature_value: String,
    /// Optional X.509 certificate (base64 encoded, DER format).
    pub x509_certificate: Option<String>,
}

impl<'d> XmlSignature<'d> {
    /// Reads a `ds:Signature` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidResponse`] if a required part of the
    /// signature is missing or if it does not carry exactly one `Reference`.
    pub fn from_node(element: Node<'d>) -> SamlResult<Self> {
        let signed_info = required(element, "SignedInfo")?;

        let mut references = signed_info
            .child_elements()
            .filter(|c| c.has_name(XMLDSIG_NS, "Reference"));
        let reference = references
            .next()
            .ok_or_else(|| malformed("SignedInfo has no Reference"))?;
        if references.next().is_some() {
            return Err(malformed("SignedInfo must contain exactly one Reference"));
        }

        let transform_nodes: Vec<_> = reference
            .first_child(XMLDSIG_NS, "Transforms")
            .map(|t| {
                t.child_elements()
                    .filter(|c| c.has_name(XMLDSIG_NS, "Transform"))
                    .collect()
            })
            .unwrap_or_default();
        let transforms = transform_nodes
            .iter()
            .map(|t| t.attribute("Algorithm").unwrap_or_default().to_string())
            .collect();
        let transform_prefix_list = transform_nodes.iter().find_map(|t| prefix_list(*t));
        let canonicalization_prefix_list =
            prefix_list(required(signed_info, "CanonicalizationMethod")?);

        let x509_certificate = element
            .first_child(XMLDSIG_NS, "KeyInfo")
            .and_then(|k| k.first_child(XMLDSIG_NS, "X509Data"))
            .and_then(|d| d.first_child(XMLDSIG_NS, "X509Certificate"))
            .and_then(|c| c.text());

        Ok(Self {
            element,
            signed_info,
            canonicalization_uri: algorithm(signed_info, "CanonicalizationMethod")?,
            signature_method_uri: algorithm(signed_info, "SignatureMethod")?,
            reference_uri: reference
                .attribute("URI")
                .ok_or_else(|| malformed("Reference has no URI"))?
                .to_string(),
            transforms,
            transform_prefix_list,
            canonicalization_prefix_list,
            digest_method_uri: algorithm(reference, "DigestMethod")?,
            digest_value: text(reference, "DigestValue")?,
            signature_value: text(element, "SignatureValue")?,
            x509_certificate,
        })
    }

    /// Returns the ID the reference points at, without the leading `#`.
    #[must_use]
    pub fn reference_id(&self) -> Option<&str> {
        self.reference_uri
            .strip_prefix('#')
            .filter(|id| !id.is_empty())
    }

    /// Returns the signature algorithm, if supported.
    #[must_use]
    pub fn algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_uri(&self.signature_method_uri)
    }

    /// Returns the canonicalization algorithm, if supported.
    #[must_use]
    pub fn canonicalization(&self) -> Option<CanonicalizationAlgorithm> {
        CanonicalizationAlgorithm::from_uri(&self.canonicalization_uri)
    }
}

fn malformed(message: &str) -> SamlError {
    SamlError::InvalidResponse(message.to_string())
}

fn required<'d>(parent: Node<'d>, name: &str) -> SamlResult<Node<'d>> {
    parent
        .first_child(XMLDSIG_NS, name)
        .ok_or_else(|| SamlError::InvalidResponse(format!("missing ds:{name}")))
}

fn algorithm(parent: Node<'_>, name: &str) -> SamlResult<String> {
    required(parent, name)?
        .attribute("Algorithm")
        .map(str::to_string)
        .ok_or_else(|| SamlError::InvalidResponse(format!("ds:{name} has no Algorithm")))
}

/// Reads the `PrefixList` of an exclusive canonicalization parameter block.
fn prefix_list(method: Node<'_>) -> Option<String> {
    method
        .first_child(canonicalization_algorithms::EXCLUSIVE_C14N, "InclusiveNamespaces")
        .and_then(|n| n.attribute("PrefixList"))
        .map(str::trim)
        .filter(|list| !list.is_empty())
        .map(str::to_string)
}

fn text(parent: Node<'_>, name: &str) -> SamlResult<String> {
    Ok(required(parent, name)?.text().unwrap_or_default())
}

/// Configuration for signature creation.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// The signature algorithm to use.
    pub algorithm: SignatureAlgorithm,
    /// The canonicalization algorithm to use.
    pub canonicalization: CanonicalizationAlgorithm,
    /// Whether to include the X.509 certificate in the signature.
    pub include_certificate: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            algorithm: SignatureAlgorithm::RsaSha256,
            canonicalization: CanonicalizationAlgorithm::ExclusiveC14N,
            include_certificate: true,
        }
    }
}

impl SignatureConfig {
    /// Creates a new signature configuration with the given algorithm.
    #[must_use]
    pub const fn with_algorithm(algorithm: SignatureAlgorithm) -> Self {
        Self {
            algorithm,
            canonicalization: CanonicalizationAlgorithm::ExclusiveC14N,
            include_certificate: true,
        }
    }
}
