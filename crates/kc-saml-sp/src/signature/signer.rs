//! XML Signature creation.
//!
//! Produces enveloped signatures over an element of a SAML document, laid
//! out the way identity providers emit them: the `ds:Signature` follows the
//! element's `Issuer`, or opens the element when it has none.

use base64::Engine;
use kc_crypto::{digest, ecdsa_sign, pem_to_der, rsa_sign_legacy, Certificate};
use tracing::debug;

use crate::document::XmlDocument;
use crate::error::{SamlError, SamlResult};
use crate::types::{transforms, SAML_NS};

use super::{c14n::canonicalize, digest_algorithm_from_uri, SignatureConfig};

/// XML document signer.
///
/// Signs SAML documents using the configured RSA or EC private key. The key
/// type must match the configured [`SignatureAlgorithm`](super::SignatureAlgorithm).
pub struct XmlSigner {
    /// The private key in DER format (PKCS#8 or PKCS#1).
    private_key_der: Vec<u8>,
    /// The X.509 certificate in DER format (optional).
    certificate_der: Option<Vec<u8>>,
    /// Signature configuration.
    config: SignatureConfig,
}

impl XmlSigner {
    /// Creates a new signer with a private key.
    ///
    /// # Arguments
    ///
    /// * `private_key_der` - The private key in DER format
    /// * `certificate_der` - Optional X.509 certificate in DER format
    #[must_use]
    pub fn new(private_key_der: Vec<u8>, certificate_der: Option<Vec<u8>>) -> Self {
        Self {
            private_key_der,
            certificate_der,
            config: SignatureConfig::default(),
        }
    }

    /// Creates a new signer from PEM-encoded key and certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Crypto`] if the key or certificate cannot be decoded.
    pub fn from_pem(private_key_pem: &str, certificate_pem: Option<&str>) -> SamlResult<Self> {
        let private_key_der = pem_to_der(private_key_pem, "PRIVATE KEY")
            .or_else(|| pem_to_der(private_key_pem, "RSA PRIVATE KEY"))
            .ok_or_else(|| SamlError::Crypto("Invalid private key PEM".to_string()))?;

        let certificate_der = certificate_pem
            .map(Certificate::from_pem)
            .transpose()?
            .map(|cert| cert.der().to_vec());

        Ok(Self::new(private_key_der, certificate_der))
    }

    /// Sets the signature configuration.
    #[must_use]
    pub fn with_config(mut self, config: SignatureConfig) -> Self {
        self.config = config;
        self
    }

    /// Signs an XML document.
    ///
    /// # Arguments
    ///
    /// * `xml` - The XML document to sign
    /// * `reference_id` - The ID of the element to sign (without the '#' prefix)
    ///
    /// # Returns
    ///
    /// The signed XML document with the `<ds:Signature>` element inserted.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureCreation`] if the element cannot be found
    /// or signed, or [`SamlError::XmlParse`] if `xml` is not well-formed.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let doc = XmlDocument::parse(xml)?;

        let mut matches = doc.elements_with_id(reference_id);
        let target = matches.next().ok_or_else(|| {
            SamlError::SignatureCreation(format!("Element with ID '{reference_id}' not found"))
        })?;
        if matches.next().is_some() {
            return Err(SamlError::SignatureCreation(format!(
                "ID '{reference_id}' is not unique"
            )));
        }
        if target.is_self_closing() {
            return Err(SamlError::SignatureCreation(format!(
                "Element '{reference_id}' is empty"
            )));
        }

        let insert_position = target
            .first_child(SAML_NS, "Issuer")
            .and_then(|issuer| issuer.span())
            .map(|span| span.end)
            .or_else(|| target.start_tag_end())
            .ok_or_else(|| SamlError::SignatureCreation("Malformed XML element".to_string()))?;

        // The signature is inserted without surrounding whitespace, so the
        // referenced element canonicalizes the same before and after.
        let digest_algorithm = digest_algorithm_from_uri(self.config.algorithm.digest_uri())
            .ok_or_else(|| SamlError::SignatureCreation("Unsupported digest".to_string()))?;
        let digest_value = digest(digest_algorithm, canonicalize(target, None).as_bytes());
        let digest_b64 = base64::engine::general_purpose::STANDARD.encode(&digest_value);

        let signed_info = build_signed_info(reference_id, &digest_b64, &self.config);
        let signed_info_doc = XmlDocument::parse(&signed_info)?;
        let canonical_signed_info = canonicalize(signed_info_doc.root(), None);

        let signature_value = self.sign_data(canonical_signed_info.as_bytes())?;
        let signature_b64 = base64::engine::general_purpose::STANDARD.encode(&signature_value);

        let signature_element = build_signature_element(
            &signed_info,
            &signature_b64,
            self.certificate_der.as_deref(),
            &self.config,
        );

        debug!(reference_id, algorithm = self.config.algorithm.uri(), "signed element");
        Ok(insert_signature(xml, insert_position, &signature_element))
    }

    /// Signs raw data using the configured algorithm.
    fn sign_data(&self, data: &[u8]) -> SamlResult<Vec<u8>> {
        let algorithm = self.config.algorithm;
        if let Some(ec) = algorithm.ecdsa() {
            return ecdsa_sign(&self.private_key_der, data, ec)
                .map_err(|e| SamlError::SignatureCreation(format!("ECDSA signing failed: {e}")));
        }

        let rsa = algorithm.rsa().filter(|alg| alg.can_sign()).ok_or_else(|| {
            SamlError::SignatureCreation(format!("Unsupported signature algorithm: {algorithm:?}"))
        })?;

        rsa_sign_legacy(&self.private_key_der, data, rsa)
            .map_err(|e| SamlError::SignatureCreation(format!("RSA signing failed: {e}")))
    }
}

/// Builds the SignedInfo element.
fn build_signed_info(reference_id: &str, digest_b64: &str, config: &SignatureConfig) -> String {
    format!(
        r##"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
<ds:CanonicalizationMethod Algorithm="{}"/>
<ds:SignatureMethod Algorithm="{}"/>
<ds:Reference URI="#{}">
<ds:Transforms>
<ds:Transform Algorithm="{}"/>
<ds:Transform Algorithm="{}"/>
</ds:Transforms>
<ds:DigestMethod Algorithm="{}"/>
<ds:DigestValue>{}</ds:DigestValue>
</ds:Reference>
</ds:SignedInfo>"##,
        config.canonicalization.uri(),
        config.algorithm.uri(),
        reference_id,
        transforms::ENVELOPED_SIGNATURE,
        config.canonicalization.uri(),
        config.algorithm.digest_uri(),
        digest_b64
    )
}

/// Builds the complete Signature element.
fn build_signature_element(
    signed_info: &str,
    signature_value: &str,
    certificate_der: Option<&[u8]>,
    config: &SignatureConfig,
) -> String {
    let mut signature = format!(
        r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
{signed_info}
<ds:SignatureValue>{signature_value}</ds:SignatureValue>"#
    );

    if config.include_certificate {
        if let Some(cert) = certificate_der {
            let cert_b64 = base64::engine::general_purpose::STANDARD.encode(cert);
            signature.push_str(&format!(
                r"
<ds:KeyInfo>
<ds:X509Data>
<ds:X509Certificate>{cert_b64}</ds:X509Certificate>
</ds:X509Data>
</ds:KeyInfo>"
            ));
        }
    }

    signature.push_str("\n</ds:Signature>");
    signature
}

/// Inserts the signature into the XML document.
fn insert_signature(xml: &str, position: usize, signature: &str) -> String {
    format!("{}{}{}", &xml[..position], signature, &xml[position..])
}
