//! End-to-End Integration Tests
//!
//! These tests drive the public `Response` API with documents signed by a
//! test identity provider, the way an assertion consumer endpoint would.

mod common;
mod claims;
mod decoding;
mod validation;
