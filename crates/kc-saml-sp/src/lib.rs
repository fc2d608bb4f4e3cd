//! SAML 2.0 Service Provider response validation for Keycloak Rust.
//!
//! This crate consumes the SAML Response an identity provider posts back
//! after login:
//!
//! - **Decoding** - literal XML or the base64 `SAMLResponse` form value
//! - **Validation** - schema, reference digest, signature and time conditions,
//!   in that order, stopping at the first failure
//! - **Claims** - name identifier, session data and attributes, read only
//!   from the assertion the signature actually covers
//!
//! # Architecture
//!
//! - [`document`] - Owned XML document model
//! - [`signature`] - Enveloped XML-DSig verification and signing
//! - [`schema`] - Protocol schema conformance
//! - [`locator`] - Signed assertion lookup
//! - [`pipeline`] - Ordered validation checks
//! - [`claims`] - Claim extraction and memoization
//! - [`response`] - The [`Response`] facade
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use kc_saml_sp::{Response, Settings};
//!
//! let settings = Settings::default().with_idp_cert_fingerprint(fingerprint);
//! let mut response = Response::new(saml_response, settings)?;
//! response.validate_strict()?;
//! let email = response.attributes().get("mail");
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod claims;
pub mod document;
pub mod error;
pub mod locator;
pub mod pipeline;
pub mod response;
pub mod schema;
pub mod settings;
pub mod signature;
pub mod types;

pub use claims::{AttributeKey, Attributes, Symbol, XboxClaims};
pub use error::{ErrorKind, SamlError, SamlResult, ValidationError};
pub use locator::{AssertionLocator, SignedAssertion};
pub use pipeline::{ValidationOutcome, ValidationPipeline};
pub use response::Response;
pub use schema::{ProtocolSchema, SchemaValidator, SchemaViolation};
pub use settings::{Settings, TrustAnchor, ValidationOptions};
pub use signature::{SignedDocument, XmlSigner};
pub use types::*;
