//! # MLOKit Signature - Shared-Key Request Signing
//!
//! **Purpose**: compute the HMAC-SHA256 `Authorization` header blob storage
//! expects for direct account-key access.
//!
//! The string-to-sign is assembled from the verb, the content length (empty for
//! GET/HEAD), optional `Content-MD5` and `If-Match`, the canonicalized `x-ms-*`
//! headers and the canonicalized resource:
//!
//! ```text
//! VERB\n\n\n<len>\n<md5>\n\n\n\n<if-match>\n\n\n\n<x-ms-headers><resource>
//! ```
//!
//! Everything here is pure and deterministic; there is no failure mode.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Header and resource canonicalization
pub mod canonical;

/// String-to-sign, HMAC signature and request signing
pub mod shared_key;

pub use canonical::{canonicalized_headers, canonicalized_resource, VENDOR_HEADER_PREFIX};
pub use shared_key::{
    rfc1123, shared_key_authorization, storage_headers, string_to_sign, SharedKeyCredential,
    SignatureInput, DATE_HEADER, VERSION_HEADER,
};
