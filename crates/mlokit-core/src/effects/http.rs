//! HTTP effect trait definitions
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `mlokit-transport` (`ReqwestHttpHandler`)
//! - **Usage**: resolution chains (JSON metadata) and the transfer executor (raw bytes)
//!
//! Callers only ever supply (method, url, headers, optional body) and only ever
//! inspect (status, body). Handlers must not retry.

use crate::errors::{redact_query, MlokitError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// HTTP verbs used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
}

impl HttpMethod {
    /// Upper-case method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request. Header order is preserved as built.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Verb
    pub method: HttpMethod,
    /// Fully qualified URL
    pub url: String,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Request body, if any
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request with no headers or body
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// PUT request
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    /// Append a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append several headers
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// First header value matching `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body length in bytes (0 when absent)
    pub fn content_length(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &redact_query(&self.url))
            .field("headers", &header_names)
            .field("body_len", &self.content_length())
            .finish()
    }
}

/// A fully received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Entire response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON; an empty body yields `None`.
    pub fn json(&self) -> Result<Option<Value>> {
        if self.body.is_empty() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&self.body);
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| MlokitError::serialization(format!("Invalid JSON response: {e}")))
    }
}

/// HTTP effects interface
#[async_trait]
pub trait HttpEffects: Send + Sync {
    /// Perform one request and return the full response. Non-2xx statuses are
    /// returned as responses, not errors; timeouts and connection failures are
    /// errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// JSON conveniences layered over [`HttpEffects`]
#[async_trait]
pub trait HttpEffectsExt: HttpEffects {
    /// GET `url` with `Content-Type: application/json`, returning the status
    /// and parsed body.
    async fn get_json(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<(u16, Option<Value>)> {
        let request = HttpRequest::get(url)
            .with_header("Content-Type", "application/json")
            .with_headers(headers.iter().cloned());
        let response = self.execute(request).await?;
        Ok((response.status, response.json()?))
    }

    /// POST `payload` as JSON to `url`, returning the status and parsed body.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        payload: &Value,
    ) -> Result<(u16, Option<Value>)> {
        let request = HttpRequest::post(url)
            .with_header("Content-Type", "application/json")
            .with_headers(headers.iter().cloned())
            .with_body(serde_json::to_vec(payload)?);
        let response = self.execute(request).await?;
        Ok((response.status, response.json()?))
    }

    /// GET `url` and return the raw body. Any non-2xx status is an error.
    async fn get_bytes(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>> {
        let request = HttpRequest::get(url).with_headers(headers.iter().cloned());
        let response = self.execute(request).await?;
        if !response.is_success() {
            return Err(MlokitError::status(response.status, url));
        }
        Ok(response.body)
    }
}

impl<T: HttpEffects + ?Sized> HttpEffectsExt for T {}

/// `Authorization: Bearer <token>` header pair
pub fn bearer(token: &str) -> (String, String) {
    ("Authorization".to_string(), format!("Bearer {token}"))
}
