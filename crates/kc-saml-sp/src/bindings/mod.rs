//! SAML bindings implementation.
//!
//! An assertion consumer receives the Response through the HTTP-POST
//! binding as the base64 `SAMLResponse` form field. Callers that already
//! unwrapped the message may hand over the literal XML instead; the decoder
//! accepts both.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kc_saml_sp::bindings::HttpPostBinding;
//!
//! let xml = HttpPostBinding::decode_response(form.saml_response.as_bytes())?;
//! ```

mod post;

pub use post::*;
