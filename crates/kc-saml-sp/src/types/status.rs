//! SAML Status types.
//!
//! Status information carried by the outer protocol Response.

use serde::{Deserialize, Serialize};

use super::{status_codes, SAMLP_NS};
use crate::document::Node;

/// SAML protocol status.
///
/// Contains the status code and optional message for a SAML response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Reads a `samlp:Status` element.
    ///
    /// Returns `None` if the element has no `StatusCode` with a `Value`.
    #[must_use]
    pub fn from_node(node: Node<'_>) -> Option<Self> {
        let status_code = StatusCode::from_node(node.first_child(SAMLP_NS, "StatusCode")?)?;
        let status_message = node
            .first_child(SAMLP_NS, "StatusMessage")
            .and_then(|m| m.text());
        Some(Self {
            status_code,
            status_message,
        })
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }
}

/// SAML status code.
///
/// Status codes can be nested, with a top-level code and optional sub-code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// The status code URI value.
    pub value: String,

    /// Optional nested status code providing more detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a new status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    fn from_node(node: Node<'_>) -> Option<Self> {
        let value = node.attribute("Value")?;
        Some(Self {
            value: value.to_string(),
            status_code: node
                .first_child(SAMLP_NS, "StatusCode")
                .and_then(Self::from_node)
                .map(Box::new),
        })
    }

    /// Returns true if this is a success status code.
    ///
    /// The comparison is exact: no trimming or case folding.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value == status_codes::SUCCESS
    }

    /// Returns the sub-status code value if present.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.status_code.as_ref().map(|s| s.value.as_str())
    }
}
