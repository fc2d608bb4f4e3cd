//! Response validation pipeline.
//!
//! Checks run in a fixed order and the first failure ends the run:
//!
//! 1. structure (protocol schema), unless skipped
//! 2. reference digest
//! 3. signature value against the trusted certificate
//! 4. `NotBefore`/`NotOnOrAfter` of the signed assertion, unless skipped
//!
//! The boolean and strict entry points of [`crate::Response`] both call
//! [`ValidationPipeline::run_at`].

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::{ErrorKind, ValidationError};
use crate::locator::AssertionLocator;
use crate::schema::{ProtocolSchema, SchemaValidator};
use crate::settings::{TrustAnchor, ValidationOptions};
use crate::signature::SignedDocument;
use crate::types::parse_instant;

/// Result of a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every enabled check passed.
    Valid,
    /// Errors recorded in the order they were found.
    Invalid(Vec<ValidationError>),
}

impl ValidationOutcome {
    /// Returns true for [`ValidationOutcome::Valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Returns the recorded errors, empty when valid.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }
}

impl From<Result<(), ValidationError>> for ValidationOutcome {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self::Valid,
            Err(error) => Self::Invalid(vec![error]),
        }
    }
}

/// Ordered structural, cryptographic and temporal checks over a signed document.
pub struct ValidationPipeline<'a> {
    document: &'a SignedDocument,
    trust: Option<&'a TrustAnchor>,
    trust_error: Option<String>,
    options: ValidationOptions,
    schema: Option<&'a dyn SchemaValidator>,
}

impl<'a> ValidationPipeline<'a> {
    /// Creates a pipeline. Without a trust anchor the signature check fails.
    #[must_use]
    pub fn new(document: &'a SignedDocument, trust: Option<&'a TrustAnchor>) -> Self {
        Self {
            document,
            trust,
            trust_error: None,
            options: ValidationOptions::default(),
            schema: None,
        }
    }

    /// Records why no trust anchor could be resolved. The signature step
    /// reports it when no anchor is present.
    #[must_use]
    pub fn with_trust_error(mut self, error: impl Into<String>) -> Self {
        self.trust_error = Some(error.into());
        self
    }

    /// Sets the validation options.
    #[must_use]
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the packaged protocol schema.
    #[must_use]
    pub fn with_schema(mut self, schema: &'a dyn SchemaValidator) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Runs every enabled check against `now`.
    #[must_use]
    pub fn validate_at(&self, now: DateTime<Utc>) -> ValidationOutcome {
        self.run_at(now).into()
    }

    /// Runs every enabled check against `now`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first failing check.
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.options.skip_structure {
            debug!("structure check skipped");
        } else {
            self.check_structure()?;
        }
        self.check_digests()?;
        self.check_signature()?;
        if self.options.skip_conditions {
            debug!("conditions check skipped");
        } else {
            self.check_conditions(now)?;
        }
        debug!("response is valid");
        Ok(())
    }

    fn check_structure(&self) -> Result<(), ValidationError> {
        let document = self.document.document();
        let violations = match self.schema {
            Some(schema) => schema.validate(document),
            None => ProtocolSchema::shared()
                .map_err(|e| fail(ErrorKind::InvalidStructure, e.to_string()))?
                .validate(document),
        };
        if violations.is_empty() {
            debug!("structure check passed");
            return Ok(());
        }

        let summary = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        Err(fail(
            ErrorKind::InvalidStructure,
            format!("{summary}\n\n{}", document.source()),
        ))
    }

    fn check_digests(&self) -> Result<(), ValidationError> {
        self.document
            .verify_digests()
            .map_err(|e| fail(ErrorKind::InvalidDigest, e.to_string()))?;
        debug!("digest check passed");
        Ok(())
    }

    fn check_signature(&self) -> Result<(), ValidationError> {
        let trust = self.trust.ok_or_else(|| {
            let message = match &self.trust_error {
                Some(reason) => format!("no usable trust anchor: {reason}"),
                None => "no trusted IdP certificate or fingerprint configured".to_string(),
            };
            fail(ErrorKind::InvalidSignature, message)
        })?;
        self.document
            .verify_signature(trust)
            .map_err(|e| fail(ErrorKind::InvalidSignature, e.to_string()))?;
        debug!("signature check passed");
        Ok(())
    }

    fn check_conditions(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let conditions = self
            .document
            .signed_element_id()
            .and_then(|id| AssertionLocator::locate(self.document.document(), &id))
            .and_then(|assertion| assertion.scoped_lookup("Conditions"));
        let Some(conditions) = conditions else {
            debug!("no conditions on the signed assertion");
            return Ok(());
        };

        let drift = Duration::seconds(i64::from(self.options.allowed_clock_drift_secs));

        if let Some(value) = conditions.attribute("NotBefore") {
            let not_before = bound(value, "NotBefore")?;
            if now + drift < not_before {
                return Err(fail(
                    ErrorKind::InvalidCondition,
                    "current time precedes NotBefore".to_string(),
                ));
            }
        }
        if let Some(value) = conditions.attribute("NotOnOrAfter") {
            let not_on_or_after = bound(value, "NotOnOrAfter")?;
            if now - drift >= not_on_or_after {
                return Err(fail(
                    ErrorKind::InvalidCondition,
                    "current time is on or after NotOnOrAfter".to_string(),
                ));
            }
        }

        debug!("conditions check passed");
        Ok(())
    }
}

fn bound(value: &str, name: &str) -> Result<DateTime<Utc>, ValidationError> {
    parse_instant(value).ok_or_else(|| {
        fail(
            ErrorKind::InvalidCondition,
            format!("{name} is not a valid timestamp: '{value}'"),
        )
    })
}

fn fail(kind: ErrorKind, message: String) -> ValidationError {
    warn!(kind = %kind, "{}", message.lines().next().unwrap_or_default());
    ValidationError::new(kind, message)
}
