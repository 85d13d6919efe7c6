//! Test server fixtures for networking integration tests
//!
//! This crate re-exports the public API of [`fixture_api`], which bundles an
//! in-process HTTP test server and an in-process WebSocket test server
//! (plain and TLS).

pub use fixture_api::*;
