//! # NotiSync Testkit
//!
//! Test utilities for NotiSync.
//!
//! This crate provides:
//! - Deterministic notification fixtures
//! - A harness wiring a session to in-memory transports
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notisync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_session() {
//!     let harness = TestHarness::with_records(unread_batch(1..=3));
//!     let session = harness.start().await;
//!     // ... drive the session
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
