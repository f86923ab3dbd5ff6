//! Shared-key authorization
//!
//! Signature = base64(HMAC-SHA256(base64-decode(key), StringToSign)), sent as
//! `Authorization: SharedKey <account>:<signature>`. A key that is not valid
//! base64 is rejected when the credential is built. Signing itself is a pure
//! local computation and cannot fail; a wrong key or clock only shows up later
//! as a 403 from the storage service.

use crate::canonical::{canonicalized_headers, canonicalized_resource};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use mlokit_core::{HttpMethod, HttpRequest, MlokitError, Result};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Date header name
pub const DATE_HEADER: &str = "x-ms-date";

/// Service version header name
pub const VERSION_HEADER: &str = "x-ms-version";

/// Format a timestamp as RFC-1123 in GMT, e.g. `Wed, 01 Jan 2020 00:00:00 GMT`.
pub fn rfc1123(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Vendor headers every signed storage request carries.
pub fn storage_headers(now: DateTime<Utc>, api_version: &str) -> Vec<(String, String)> {
    vec![
        (DATE_HEADER.to_string(), rfc1123(now)),
        (VERSION_HEADER.to_string(), api_version.to_string()),
    ]
}

/// Inputs to the string-to-sign beyond the headers and resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureInput<'a> {
    /// Request verb
    pub method: HttpMethod,
    /// Full request URL
    pub url: &'a str,
    /// Body length; ignored for GET and HEAD
    pub content_length: Option<u64>,
    /// `Content-MD5` value, empty unless supplied
    pub content_md5: &'a str,
    /// `If-Match` value, empty unless supplied
    pub if_match: &'a str,
}

impl<'a> SignatureInput<'a> {
    /// Input with no `Content-MD5` and no `If-Match`
    pub fn new(method: HttpMethod, url: &'a str, content_length: Option<u64>) -> Self {
        Self {
            method,
            url,
            content_length,
            content_md5: "",
            if_match: "",
        }
    }
}

/// Build the string-to-sign.
///
/// GET and HEAD always sign an empty content length; other verbs sign the
/// decimal length, `0` when none is given.
pub fn string_to_sign(
    input: &SignatureInput<'_>,
    headers: &[(String, String)],
    account: &str,
) -> String {
    let content_length = match input.method {
        HttpMethod::Get | HttpMethod::Head => String::new(),
        _ => input.content_length.unwrap_or(0).to_string(),
    };

    format!(
        "{}\n\n\n{}\n{}\n\n\n\n{}\n\n\n\n{}{}",
        input.method.as_str(),
        content_length,
        input.content_md5,
        input.if_match,
        canonicalized_headers(headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        canonicalized_resource(input.url, account),
    )
}

/// Storage account name plus its keyed MAC
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    mac: HmacSha256,
}

impl SharedKeyCredential {
    /// Create a credential from an account name and base64 account key.
    ///
    /// Fails with [`MlokitError::Credential`] when the key is not base64.
    pub fn new(account: impl Into<String>, key_b64: &str) -> Result<Self> {
        let account = account.into();
        let key = STANDARD.decode(key_b64.trim()).map_err(|e| {
            MlokitError::credential(
                "storage account",
                format!("account key for {account} is not valid base64: {e}"),
            )
        })?;
        let mac = HmacSha256::new_from_slice(&key).map_err(|_| {
            MlokitError::credential("storage account", format!("unusable account key for {account}"))
        })?;
        Ok(Self { account, mac })
    }

    /// Storage account name
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Compute the `Authorization` header value for a request.
    pub fn authorization(&self, input: &SignatureInput<'_>, headers: &[(String, String)]) -> String {
        let message = string_to_sign(input, headers, &self.account);
        let signature = self.sign(message.as_bytes());
        format!("SharedKey {}:{}", self.account, signature)
    }

    /// base64(HMAC-SHA256(decoded key, message))
    fn sign(&self, message: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(message);
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Attach `x-ms-date`, `x-ms-version` and `Authorization` to `request`.
    ///
    /// Any `Content-Length` already on the request is ignored in favour of the
    /// body length.
    pub fn sign_request(&self, request: &mut HttpRequest, now: DateTime<Utc>, api_version: &str) {
        request.headers.extend(storage_headers(now, api_version));

        let content_length = request.body.as_ref().map(|body| body.len() as u64);
        let input = SignatureInput::new(request.method, &request.url, content_length);
        let authorization = self.authorization(&input, &request.headers);

        tracing::debug!(
            account = %self.account,
            method = %request.method,
            "Signed storage request"
        );
        request
            .headers
            .push(("Authorization".to_string(), authorization));
    }
}

impl fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .field("mac", &"<redacted>")
            .finish()
    }
}

/// Compute `SharedKey <account>:<signature>` from primitive inputs.
pub fn shared_key_authorization(
    account: &str,
    key_b64: &str,
    method: HttpMethod,
    url: &str,
    headers: &[(String, String)],
    content_length: Option<u64>,
) -> Result<String> {
    let credential = SharedKeyCredential::new(account, key_b64)?;
    Ok(credential.authorization(&SignatureInput::new(method, url, content_length), headers))
}
