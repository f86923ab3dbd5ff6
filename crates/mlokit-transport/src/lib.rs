//! # MLOKit Transport
//!
//! Network side of the engine:
//!
//! - [`ReqwestHttpHandler`]: the production [`HttpEffects`](mlokit_core::HttpEffects)
//!   implementation. One request per call, full body buffered, fixed timeout,
//!   no retries.
//! - [`transfer`]: whole-object blob download and upload with shared-key
//!   signing, plus unsigned download of SAS-bearing content URIs.
//!
//! ## What's NOT in this crate
//!
//! - Working out *which* blob to move (`mlokit-resolve`)
//! - Chunked, resumable or streaming transfers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// `reqwest`-backed HTTP handler
pub mod handler;

/// Blob transfer executor
pub mod transfer;

pub use handler::ReqwestHttpHandler;
pub use transfer::{download_blob, download_url, upload_blob, BlobTransfer};
