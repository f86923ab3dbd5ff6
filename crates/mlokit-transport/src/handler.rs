//! Production HTTP handler
//!
//! Wraps a single `reqwest::Client` configured from [`HttpConfig`]. Statuses
//! are passed through untouched; only failures below HTTP become errors.

use async_trait::async_trait;
use mlokit_core::errors::redact_query;
use mlokit_core::{HttpConfig, HttpEffects, HttpMethod, HttpRequest, HttpResponse, MlokitError, Result};
use std::time::Duration;
use tracing::debug;

/// `HttpEffects` over `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestHttpHandler {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestHttpHandler {
    /// Build a handler from configuration
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| MlokitError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    /// Configured per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> MlokitError {
        if error.is_timeout() {
            MlokitError::timeout(url, self.timeout.as_millis() as u64)
        } else {
            // reqwest errors embed the full URL, SAS query included
            MlokitError::transport(error.without_url().to_string())
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
    }
}

#[async_trait]
impl HttpEffects for ReqwestHttpHandler {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(to_reqwest_method(method), url.as_str());
        for (name, value) in &headers {
            // set by reqwest from the body
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(&url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&url, e))?
            .to_vec();

        debug!(
            %method,
            url = redact_query(&url),
            status,
            bytes = body.len(),
            "HTTP exchange complete"
        );
        Ok(HttpResponse::new(status, body))
    }
}
