//! SAML 2.0 types and constants.
//!
//! Namespace and algorithm URIs, the protocol status model and timestamp
//! parsing shared by the validation pipeline and the claim extractor.

mod constants;
mod instant;
mod status;

pub use constants::*;
pub use instant::*;
pub use status::*;
