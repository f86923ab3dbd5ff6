//! MLOKit Testing Infrastructure
//!
//! Deterministic stand-ins for the effect handlers plus payload fixtures, so
//! resolution chains and transfers can be exercised without a network.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! Add this to your crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! mlokit-testkit = { path = "../mlokit-testkit" }
//! ```
//!
//! Then in your tests:
//! ```rust,ignore
//! use mlokit_testkit::*;
//! use mlokit_core::HttpMethod;
//! use mlokit_testkit::fixtures::json;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let http = ScriptedHttp::new()
//!         .on_json(HttpMethod::Get, "https://svc/models/1", 200, json!({"id": "1"}));
//!     // ... run a chain against &http, then inspect http.requests().await
//! }
//! ```

pub mod clock;
pub mod fixtures;
pub mod http;

pub use clock::{FixedClock, InstantSleep};
pub use http::ScriptedHttp;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
