//! Shared test utilities for scrapectl integration tests.
//!
//! This module provides:
//! - `TestServer` for running the HTTP API on an ephemeral port
//! - Builder patterns for creating test configurations programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestServer;
