//! Signed assertion lookup.
//!
//! Every read of assertion content goes through a [`SignedAssertion`],
//! which can only be obtained for the element whose ID the signature
//! covers and only hands out nodes from beneath that element. A second,
//! unsigned assertion placed next to the signed one is therefore invisible
//! to claim extraction and to the conditions check.

use tracing::{debug, warn};

use crate::document::{Node, XmlDocument};
use crate::types::{SAMLP_NS, SAML_NS};

/// Resolves the assertion a signature covers.
pub struct AssertionLocator;

impl AssertionLocator {
    /// Finds the assertion identified by `signed_element_id`.
    ///
    /// Candidates are the root element when it is a `saml:Assertion`, or the
    /// `saml:Assertion` children of a root `samlp:Response`. The first
    /// candidate whose `ID` matches wins. When the signature covers the
    /// enclosing `samlp:Response` itself, its first assertion is returned.
    #[must_use]
    pub fn locate<'d>(
        document: &'d XmlDocument,
        signed_element_id: &str,
    ) -> Option<SignedAssertion<'d>> {
        let root = document.root();

        let located = if root.has_name(SAML_NS, "Assertion") {
            (root.attribute("ID") == Some(signed_element_id)).then_some(root)
        } else if root.has_name(SAMLP_NS, "Response") {
            let mut assertions = root.child_elements().filter(|c| c.has_name(SAML_NS, "Assertion"));
            if root.attribute("ID") == Some(signed_element_id) {
                assertions.next()
            } else {
                assertions.find(|a| a.attribute("ID") == Some(signed_element_id))
            }
        } else {
            None
        };

        match located {
            Some(element) => {
                debug!(id = signed_element_id, "located signed assertion");
                Some(SignedAssertion { element })
            }
            None => {
                debug!(id = signed_element_id, "no assertion matches the signed element");
                None
            }
        }
    }
}

/// The assertion element covered by a verified signature.
#[derive(Debug, Clone, Copy)]
pub struct SignedAssertion<'d> {
    element: Node<'d>,
}

impl<'d> SignedAssertion<'d> {
    /// Returns the `ID` of the assertion.
    #[must_use]
    pub fn id(&self) -> &'d str {
        self.element.attribute("ID").unwrap_or_default()
    }

    /// Returns the assertion element itself.
    #[must_use]
    pub fn element(&self) -> Node<'d> {
        self.element
    }

    /// Evaluates a relative path beneath the assertion.
    ///
    /// `path` is a `/`-separated list of local names in the SAML assertion
    /// namespace, e.g. `Subject/NameID`; each step selects the first matching
    /// child element. An empty path selects the assertion. Absolute paths,
    /// `.`, `..` and empty steps are rejected.
    #[must_use]
    pub fn scoped_lookup(&self, path: &str) -> Option<Node<'d>> {
        if path.is_empty() {
            return Some(self.element);
        }

        let mut current = self.element;
        for step in path.split('/') {
            if step.is_empty() || step == "." || step == ".." {
                warn!(path, "rejected assertion lookup path");
                return None;
            }
            current = current.first_child(SAML_NS, step)?;
        }
        Some(current)
    }
}
