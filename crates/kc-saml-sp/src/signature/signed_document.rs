//! Enveloped XML signature verification.
//!
//! A [`SignedDocument`] owns a parsed response and answers three questions
//! about it: do the reference digests match, is the signature value valid
//! for the trusted key, and which element did the signature cover.
//!
//! Only enveloped signatures are accepted. The referenced ID must be unique
//! in the document and the `ds:Signature` must be a child of the referenced
//! element, so a verified signature always pins exactly one subtree.

use base64::Engine;
use kc_crypto::{
    digest, ecdsa_verify, normalize_fingerprint, rsa_verify_legacy, Certificate, KeyKind,
};
use tracing::{debug, warn};

use super::{c14n::canonicalize, digest_algorithm_from_uri, XmlSignature};
use crate::document::{Node, XmlDocument};
use crate::error::{SamlError, SamlResult};
use crate::settings::TrustAnchor;
use crate::types::{canonicalization_algorithms, transforms, SAML_NS, XMLDSIG_NS};

/// A parsed XML document carrying an enveloped signature.
#[derive(Debug)]
pub struct SignedDocument {
    document: XmlDocument,
}

impl SignedDocument {
    /// Wraps an already parsed document.
    #[must_use]
    pub fn new(document: XmlDocument) -> Self {
        Self { document }
    }

    /// Parses XML text.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::XmlParse`] if the text is not well-formed.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        Ok(Self::new(XmlDocument::parse(xml)?))
    }

    /// Returns the underlying document.
    #[must_use]
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Finds the signature that governs this document.
    ///
    /// Candidates are `ds:Signature` children of the root element and of
    /// `saml:Assertion` children of the root; the first in document order wins.
    fn signature_element(&self) -> Option<Node<'_>> {
        let root = self.document.root();
        root.child_elements().find_map(|child| {
            if child.has_name(XMLDSIG_NS, "Signature") {
                Some(child)
            } else if child.has_name(SAML_NS, "Assertion") {
                child.first_child(XMLDSIG_NS, "Signature")
            } else {
                None
            }
        })
    }

    fn signature(&self) -> SamlResult<XmlSignature<'_>> {
        let element = self
            .signature_element()
            .ok_or_else(|| SamlError::InvalidResponse("document is not signed".to_string()))?;
        XmlSignature::from_node(element)
    }

    /// Returns the ID of the element the signature covers, if the document
    /// carries a readable signature with a same-document reference.
    #[must_use]
    pub fn signed_element_id(&self) -> Option<String> {
        self.signature()
            .ok()
            .and_then(|sig| sig.reference_id().map(str::to_string))
    }

    /// Verifies the reference digest.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::DigestMismatch`] if the signature or reference is
    /// malformed, the referenced element is missing, duplicated or does not
    /// envelop the signature, a transform or digest algorithm is unsupported,
    /// or the computed digest differs from `DigestValue`.
    pub fn verify_digests(&self) -> SamlResult<()> {
        let sig = self.signature().map_err(|e| mismatch(&e.to_string()))?;
        let id = sig
            .reference_id()
            .ok_or_else(|| mismatch("reference URI must point at an element ID"))?;

        let mut matches = self.document.elements_with_id(id);
        let target = matches
            .next()
            .ok_or_else(|| mismatch(&format!("referenced element '{id}' not found")))?;
        if matches.next().is_some() {
            warn!(id, "duplicate ID attribute in signed document");
            return Err(mismatch(&format!("ID '{id}' is not unique")));
        }
        if sig.element.parent() != Some(target) {
            return Err(mismatch("signature is not enveloped by the referenced element"));
        }

        if let Some(prefixes) = &sig.transform_prefix_list {
            return Err(mismatch(&format!(
                "unsupported InclusiveNamespaces PrefixList '{prefixes}'"
            )));
        }
        for transform in &sig.transforms {
            match transform.as_str() {
                transforms::ENVELOPED_SIGNATURE
                | canonicalization_algorithms::EXCLUSIVE_C14N
                | canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS => {}
                other => return Err(mismatch(&format!("unsupported transform '{other}'"))),
            }
        }

        let algorithm = digest_algorithm_from_uri(&sig.digest_method_uri).ok_or_else(|| {
            mismatch(&format!("unsupported digest method '{}'", sig.digest_method_uri))
        })?;
        let expected = decode_base64(&sig.digest_value)
            .map_err(|e| mismatch(&format!("DigestValue: {e}")))?;

        let canonical = canonicalize(target, Some(sig.element.id()));
        let actual = digest(algorithm, canonical.as_bytes());
        if actual != expected {
            warn!(id, algorithm = algorithm.name(), "reference digest mismatch");
            return Err(mismatch(&format!("digest of element '{id}' does not match DigestValue")));
        }

        debug!(id, "reference digest verified");
        Ok(())
    }

    /// Verifies the signature value over the canonical `SignedInfo`.
    ///
    /// With a certificate anchor the configured certificate's key is used.
    /// With a fingerprint anchor the signature must embed an
    /// `X509Certificate` whose fingerprint matches.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] on any failure.
    pub fn verify_signature(&self, anchor: &TrustAnchor) -> SamlResult<()> {
        let sig = self.signature().map_err(|e| invalid(&e.to_string()))?;

        if sig.canonicalization().is_none() {
            return Err(invalid(&format!(
                "unsupported canonicalization method '{}'",
                sig.canonicalization_uri
            )));
        }
        if let Some(prefixes) = &sig.canonicalization_prefix_list {
            return Err(invalid(&format!(
                "unsupported InclusiveNamespaces PrefixList '{prefixes}'"
            )));
        }
        let algorithm = sig.algorithm().ok_or_else(|| {
            invalid(&format!("unsupported signature method '{}'", sig.signature_method_uri))
        })?;

        let certificate = match anchor {
            TrustAnchor::Certificate(cert) => cert.clone(),
            TrustAnchor::Fingerprint(expected) => {
                let embedded = sig
                    .x509_certificate
                    .as_deref()
                    .ok_or_else(|| invalid("signature carries no X509Certificate"))?;
                let cert = Certificate::from_pem(embedded).map_err(|e| invalid(&e.to_string()))?;
                if normalize_fingerprint(&cert.fingerprint()) != normalize_fingerprint(expected) {
                    warn!(fingerprint = %cert.fingerprint(), "embedded certificate is not trusted");
                    return Err(invalid("certificate fingerprint does not match"));
                }
                cert
            }
        };

        let key = certificate.public_key().map_err(|e| invalid(&e.to_string()))?;
        let signature_value = decode_base64(&sig.signature_value)
            .map_err(|e| invalid(&format!("SignatureValue: {e}")))?;
        let signed_info = canonicalize(sig.signed_info, None);

        let verified = match (key.kind, algorithm.rsa(), algorithm.ecdsa()) {
            (KeyKind::Rsa, Some(rsa), _) => {
                rsa_verify_legacy(&key.der, signed_info.as_bytes(), &signature_value, rsa)
            }
            (KeyKind::Ec, _, Some(ec)) => {
                ecdsa_verify(&key.der, signed_info.as_bytes(), &signature_value, ec)
            }
            _ => {
                return Err(invalid(&format!(
                    "certificate key does not match signature method '{}'",
                    sig.signature_method_uri
                )));
            }
        }
        .map_err(|e| invalid(&e.to_string()))?;

        if !verified {
            warn!(algorithm = algorithm.uri(), "signature value did not verify");
            return Err(invalid("signature value does not verify with the trusted key"));
        }

        if algorithm.is_deprecated() {
            warn!(algorithm = algorithm.uri(), "accepted signature using a deprecated algorithm");
        }
        debug!(algorithm = algorithm.uri(), "signature verified");
        Ok(())
    }
}

fn mismatch(message: &str) -> SamlError {
    SamlError::DigestMismatch(message.to_string())
}

fn invalid(message: &str) -> SamlError {
    SamlError::SignatureInvalid(message.to_string())
}

fn decode_base64(value: &str) -> SamlResult<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}
