//! Identity, session and attribute claims.
//!
//! A [`ClaimExtractor`] reads assertion content exclusively through the
//! [`SignedAssertion`] handed to it by the locator. The only values read
//! outside the signed assertion are the envelope's `Issuer` and `Status`,
//! which describe the protocol message rather than the subject.
//!
//! [`ClaimCache`] holds one lazily filled slot per claim so each is
//! computed at most once for the lifetime of a response.

mod attributes;

pub use attributes::*;

use std::cell::OnceCell;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::document::{Node, NodeId, XmlDocument};
use crate::locator::SignedAssertion;
use crate::types::{parse_instant, Status, SAMLP_NS, SAML_NS};

/// Reads claims from a document and its signed assertion.
#[derive(Debug, Clone, Copy)]
pub struct ClaimExtractor<'d> {
    envelope: Node<'d>,
    assertion: Option<SignedAssertion<'d>>,
}

impl<'d> ClaimExtractor<'d> {
    /// Creates an extractor. Without a signed assertion every assertion
    /// claim is absent.
    #[must_use]
    pub fn new(document: &'d XmlDocument, assertion: Option<SignedAssertion<'d>>) -> Self {
        Self {
            envelope: document.root(),
            assertion,
        }
    }

    fn lookup(&self, path: &str) -> Option<Node<'d>> {
        self.assertion.and_then(|a| a.scoped_lookup(path))
    }

    /// Text of `Subject/NameID`.
    #[must_use]
    pub fn name_id(&self) -> Option<String> {
        self.lookup("Subject/NameID").and_then(|n| n.text())
    }

    /// `SessionIndex` of the `AuthnStatement`.
    #[must_use]
    pub fn session_index(&self) -> Option<String> {
        self.lookup("AuthnStatement")
            .and_then(|s| s.attribute("SessionIndex"))
            .map(str::to_string)
    }

    /// `SessionNotOnOrAfter` of the `AuthnStatement`; absent if missing or malformed.
    #[must_use]
    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.lookup("AuthnStatement")
            .and_then(|s| s.attribute("SessionNotOnOrAfter"))
            .and_then(parse_instant)
    }

    /// The envelope's `Issuer`, falling back to the signed assertion's.
    #[must_use]
    pub fn issuer(&self) -> Option<String> {
        let envelope_issuer = self
            .envelope
            .has_name(SAMLP_NS, "Response")
            .then(|| self.envelope.first_child(SAML_NS, "Issuer"))
            .flatten();
        envelope_issuer
            .or_else(|| self.lookup("Issuer"))
            .and_then(|n| n.text())
    }

    /// The envelope's `Status`.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.envelope
            .first_child(SAMLP_NS, "Status")
            .and_then(Status::from_node)
    }

    /// The `Conditions` element of the signed assertion.
    #[must_use]
    pub fn conditions(&self) -> Option<Node<'d>> {
        self.lookup("Conditions")
    }

    /// Attributes of the signed assertion's first `AttributeStatement`.
    ///
    /// Each attribute contributes the text of its first `AttributeValue`
    /// (empty when the value has no text). Attributes without a value are
    /// skipped, and a repeated name keeps the last value.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::default();
        let Some(statement) = self.lookup("AttributeStatement") else {
            return attributes;
        };

        for attribute in statement.child_elements() {
            let Some(name) = attribute.attribute("Name") else {
                continue;
            };
            let Some(value) = attribute.first_child(SAML_NS, "AttributeValue") else {
                continue;
            };
            attributes.insert(name, value.text().unwrap_or_default());
        }
        attributes
    }
}

/// Memoized claims of one response.
///
/// Slots are filled on first access and never reset.
#[derive(Debug, Default)]
pub struct ClaimCache {
    name_id: OnceCell<Option<String>>,
    session_index: OnceCell<Option<String>>,
    session_expires_at: OnceCell<Option<DateTime<Utc>>>,
    issuer: OnceCell<Option<String>>,
    status: OnceCell<Option<Status>>,
    conditions: OnceCell<Option<NodeId>>,
    attributes: OnceCell<Attributes>,
    xbox: OnceCell<XboxClaims>,
}

impl ClaimCache {
    /// Cached [`ClaimExtractor::name_id`].
    pub fn name_id<'d>(&self, extractor: impl FnOnce() -> ClaimExtractor<'d>) -> Option<&str> {
        self.name_id
            .get_or_init(|| computed("name_id", extractor().name_id()))
            .as_deref()
    }

    /// Cached [`ClaimExtractor::session_index`].
    pub fn session_index<'d>(
        &self,
        extractor: impl FnOnce() -> ClaimExtractor<'d>,
    ) -> Option<&str> {
        self.session_index
            .get_or_init(|| computed("session_index", extractor().session_index()))
            .as_deref()
    }

    /// Cached [`ClaimExtractor::session_expires_at`].
    pub fn session_expires_at<'d>(
        &self,
        extractor: impl FnOnce() -> ClaimExtractor<'d>,
    ) -> Option<DateTime<Utc>> {
        *self
            .session_expires_at
            .get_or_init(|| computed("session_expires_at", extractor().session_expires_at()))
    }

    /// Cached [`ClaimExtractor::issuer`].
    pub fn issuer<'d>(&self, extractor: impl FnOnce() -> ClaimExtractor<'d>) -> Option<&str> {
        self.issuer
            .get_or_init(|| computed("issuer", extractor().issuer()))
            .as_deref()
    }

    /// Cached [`ClaimExtractor::status`].
    pub fn status<'d>(&self, extractor: impl FnOnce() -> ClaimExtractor<'d>) -> Option<&Status> {
        self.status
            .get_or_init(|| computed("status", extractor().status()))
            .as_ref()
    }

    /// Cached id of [`ClaimExtractor::conditions`].
    pub fn conditions<'d>(&self, extractor: impl FnOnce() -> ClaimExtractor<'d>) -> Option<NodeId> {
        *self
            .conditions
            .get_or_init(|| computed("conditions", extractor().conditions().map(|n| n.id())))
    }

    /// Cached [`ClaimExtractor::attributes`].
    pub fn attributes<'d>(&self, extractor: impl FnOnce() -> ClaimExtractor<'d>) -> &Attributes {
        self.attributes.get_or_init(|| {
            let attributes = extractor().attributes();
            debug!(count = attributes.len(), "computed attributes claim");
            attributes
        })
    }

    /// Cached [`XboxClaims`] projection of the attributes.
    pub fn xbox_claims<'d>(&self, extractor: impl FnOnce() -> ClaimExtractor<'d>) -> &XboxClaims {
        self.xbox
            .get_or_init(|| XboxClaims::from_attributes(self.attributes(extractor)))
    }
}

fn computed<T>(claim: &str, value: Option<T>) -> Option<T> {
    debug!(claim, present = value.is_some(), "computed claim");
    value
}
