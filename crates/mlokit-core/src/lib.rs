//! MLOKit Core - Resolution Engine Foundation
//!
//! This crate provides the data model, error type and effect interfaces shared by
//! every other MLOKit crate. It contains no network code: HTTP and clock access are
//! expressed as effect traits so resolution chains can run against the production
//! `reqwest` handler or a scripted handler in tests.
//!
//! # Contents
//!
//! - `MlokitError` / `Result`: the single error type surfaced to callers
//! - `Credential`, `CredentialShape`: delimited secret parsing with enforced field counts
//! - `StorageCoordinate`, `ContentUri`, `TreeNode`, `Page`: ephemeral resolution types
//! - `extract_asset_id`, `AzureFilePath`, `GcsUri`: fixed-grammar identifier parsers
//! - `MlokitConfig`: TOML + environment configuration
//! - `HttpEffects`, `ClockEffects`, `SleepEffects`: effect interfaces
//!
//! ## What's NOT in this crate
//!
//! - Request signing (`mlokit-signature`)
//! - HTTP handlers and blob transfer (`mlokit-transport`)
//! - Platform resolution chains (`mlokit-resolve`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Unified error handling
pub mod errors;

/// Delimited credential parsing
pub mod credential;

/// Resolution data model
pub mod types;

/// Fixed-grammar identifier parsers
pub mod identifiers;

/// Configuration loading and validation
pub mod config;

/// Effect interfaces (no implementations beyond the system clock)
pub mod effects;

pub use config::{HttpConfig, MlokitConfig, StorageConfig, VertexConfig, WalkerConfig};
pub use credential::{Credential, CredentialShape};
pub use effects::{
    bearer, ClockEffects, HttpEffects, HttpEffectsExt, HttpMethod, HttpRequest, HttpResponse,
    SleepEffects, SystemClock,
};
pub use errors::{MlokitError, Result};
pub use identifiers::{extract_asset_id, AzureFilePath, GcsUri};
pub use types::{Artifact, ContentUri, NodeKind, Page, StorageCoordinate, StorageSubtype, TreeNode};
