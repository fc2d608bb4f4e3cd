//! HTTP-POST Binding implementation.
//!
//! Decodes the `SAMLResponse` value posted to an assertion consumer service.

use base64::Engine;
use tracing::debug;

use crate::error::{SamlError, SamlResult};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes a SAML message the way it travels in the `SAMLResponse` form field.
    #[must_use]
    pub fn encode(xml: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(xml)
    }

    /// Decodes a posted SAML response.
    ///
    /// Input whose first non-whitespace byte is `<` is taken as literal XML.
    /// Anything else is base64 (standard alphabet, whitespace and line
    /// breaks ignored).
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidArgument`] for empty input,
    /// [`SamlError::Base64Decode`] if the payload is not valid base64 and
    /// [`SamlError::InvalidResponse`] if the decoded bytes are not UTF-8.
    pub fn decode_response(raw: &[u8]) -> SamlResult<String> {
        let Some(first) = raw.iter().find(|b| !b.is_ascii_whitespace()) else {
            return Err(SamlError::InvalidArgument(
                "Response cannot be empty".to_string(),
            ));
        };

        let bytes = if *first == b'<' {
            raw.to_vec()
        } else {
            let compact: Vec<u8> = raw
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;
            debug!(encoded = raw.len(), decoded = decoded.len(), "decoded base64 SAMLResponse");
            decoded
        };

        String::from_utf8(bytes)
            .map_err(|e| SamlError::InvalidResponse(format!("Invalid UTF-8 in message: {e}")))
    }
}
