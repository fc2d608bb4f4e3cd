//! The SAML Response facade.
//!
//! A [`Response`] owns the raw posted message and its parsed document,
//! runs the validation pipeline on demand and exposes the claims of the
//! signed assertion.
//!
//! # Example
//!
//! ```rust,ignore
//! use kc_saml_sp::{Response, Settings};
//!
//! let settings = Settings::default().with_idp_cert(idp_cert_pem);
//! let mut response = Response::new(form.saml_response, settings)?;
//! if response.is_valid() {
//!     let user = response.name_id();
//! }
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::bindings::HttpPostBinding;
use crate::claims::{Attributes, ClaimCache, ClaimExtractor, XboxClaims};
use crate::document::{Node, XmlDocument};
use crate::error::{SamlError, SamlResult, ValidationError};
use crate::locator::AssertionLocator;
use crate::pipeline::ValidationPipeline;
use crate::settings::{Settings, ValidationOptions};
use crate::signature::SignedDocument;
use crate::types::Status;

/// A received SAML Response.
///
/// Claims are computed on first access and memoized. Re-running validation
/// replaces the error log but does not recompute claims already read.
///
/// A `Response` is not `Sync`; share it across threads only behind a lock.
#[derive(Debug)]
pub struct Response {
    raw: Vec<u8>,
    document: SignedDocument,
    settings: Settings,
    options: ValidationOptions,
    errors: Vec<ValidationError>,
    claims: ClaimCache,
}

impl Response {
    /// Decodes and parses a posted response.
    ///
    /// `raw` is either literal XML or the base64 `SAMLResponse` form value.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidArgument`] for empty input, before any
    /// parsing. Decoding and parse failures are returned as their own
    /// [`SamlError`] variants.
    pub fn new(raw: impl AsRef<[u8]>, settings: Settings) -> SamlResult<Self> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(SamlError::InvalidArgument(
                "Response cannot be empty".to_string(),
            ));
        }

        let xml = HttpPostBinding::decode_response(raw)?;
        let document = SignedDocument::parse(&xml)?;
        debug!(bytes = raw.len(), "parsed SAML response");

        Ok(Self {
            raw: raw.to_vec(),
            document,
            settings,
            options: ValidationOptions::default(),
            errors: Vec::new(),
            claims: ClaimCache::default(),
        })
    }

    /// Sets the validation options.
    #[must_use]
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates against the current time, recording any failure.
    pub fn is_valid(&mut self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Validates against `now`, recording any failure.
    pub fn is_valid_at(&mut self, now: DateTime<Utc>) -> bool {
        self.run(now).is_ok()
    }

    /// Validates against the current time.
    ///
    /// # Errors
    ///
    /// Returns the first failed check. It is also recorded in the error log.
    pub fn validate_strict(&mut self) -> Result<(), ValidationError> {
        self.validate_strict_at(Utc::now())
    }

    /// Validates against `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check. It is also recorded in the error log.
    pub fn validate_strict_at(&mut self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        self.run(now)
    }

    fn run(&mut self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let trust = self.settings.trust_anchor();
        let mut pipeline = ValidationPipeline::new(&self.document, trust.as_ref().ok())
            .with_options(self.options);
        if let Err(e) = &trust {
            warn!(error = %e, "no usable trust anchor");
            pipeline = pipeline.with_trust_error(e.to_string());
        }

        let outcome = pipeline.validate_at(now);
        self.errors = outcome.errors().to_vec();

        match self.errors.first() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Errors recorded by the most recent validation run.
    #[must_use]
    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Empties the error log. Memoized claims are kept.
    pub fn clear_validation_errors(&mut self) {
        self.errors.clear();
    }

    /// The raw input as received.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The parsed document.
    #[must_use]
    pub fn document(&self) -> &XmlDocument {
        self.document.document()
    }

    /// The ID of the element the signature covers, resolved from the document.
    #[must_use]
    pub fn signed_element_id(&self) -> Option<String> {
        self.document.signed_element_id()
    }

    /// The settings this response validates against.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn extractor(&self) -> ClaimExtractor<'_> {
        let document = self.document.document();
        let assertion = self
            .document
            .signed_element_id()
            .and_then(|id| AssertionLocator::locate(document, &id));
        ClaimExtractor::new(document, assertion)
    }

    /// `Subject/NameID` of the signed assertion.
    #[must_use]
    pub fn name_id(&self) -> Option<&str> {
        self.claims.name_id(|| self.extractor())
    }

    /// `SessionIndex` of the signed assertion's `AuthnStatement`.
    #[must_use]
    pub fn session_index(&self) -> Option<&str> {
        self.claims.session_index(|| self.extractor())
    }

    /// `SessionNotOnOrAfter` of the signed assertion's `AuthnStatement`.
    #[must_use]
    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims.session_expires_at(|| self.extractor())
    }

    /// The Response `Issuer`, or the signed assertion's when the Response has none.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer(|| self.extractor())
    }

    /// The top-level protocol status.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.claims.status(|| self.extractor())
    }

    /// Returns true only if the top-level status code is exactly `Success`.
    #[must_use]
    pub fn success_status(&self) -> bool {
        self.status().is_some_and(Status::is_success)
    }

    /// Attribute claims of the signed assertion.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        self.claims.attributes(|| self.extractor())
    }

    /// Xbox Live claims of the signed assertion.
    #[must_use]
    pub fn xbox_claims(&self) -> &XboxClaims {
        self.claims.xbox_claims(|| self.extractor())
    }

    /// The signed assertion's `Conditions` element.
    #[must_use]
    pub fn conditions(&self) -> Option<Node<'_>> {
        self.claims
            .conditions(|| self.extractor())
            .map(|id| self.document.document().node(id))
    }
}
