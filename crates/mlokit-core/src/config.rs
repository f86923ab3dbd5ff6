//! MLOKit configuration
//!
//! Layering: built-in defaults, then an optional TOML file, then `MLOKIT_*`
//! environment overrides, then [`MlokitConfig::validate`].

use crate::errors::{MlokitError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default `x-ms-version` sent with shared-key storage requests
pub const DEFAULT_STORAGE_API_VERSION: &str = "2021-08-06";

/// Default User-Agent for every outbound request
pub const DEFAULT_USER_AGENT: &str = concat!("mlokit/", env!("CARGO_PKG_VERSION"));

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlokitConfig {
    /// HTTP handler settings
    pub http: HttpConfig,
    /// Blob storage settings
    pub storage: StorageConfig,
    /// Namespace walker depth bounds
    pub walker: WalkerConfig,
    /// Vertex AI model export settings
    pub vertexai: VertexConfig,
}

/// HTTP handler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout; a timeout is a hard failure, never retried
    pub timeout_secs: u64,
    /// User-Agent header value
    pub user_agent: String,
    /// Verify TLS certificates. Off by default: self-hosted platform
    /// deployments commonly use self-signed certificates.
    pub verify_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verify_tls: false,
        }
    }
}

impl HttpConfig {
    /// Timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configuration for tests: short timeout
    pub fn testing() -> Self {
        Self {
            timeout_secs: 5,
            ..Default::default()
        }
    }
}

/// Blob storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Value of the `x-ms-version` header
    pub api_version: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_STORAGE_API_VERSION.to_string(),
        }
    }
}

/// Depth bounds for recursive namespace walks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Max depth when walking from an explicit application folder
    pub app_root_depth: usize,
    /// Max depth when walking every top-level space
    pub space_depth: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            app_root_depth: 3,
            space_depth: 4,
        }
    }
}

/// Vertex AI model export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexConfig {
    /// Wait between requesting a model export and listing its output.
    /// Export is asynchronous and the API gives no completion signal.
    pub export_wait_secs: u64,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            export_wait_secs: 15,
        }
    }
}

impl VertexConfig {
    /// Export wait in milliseconds
    pub fn export_wait_ms(&self) -> u64 {
        self.export_wait_secs.saturating_mul(1000)
    }

    /// Configuration for tests: no export wait
    pub fn testing() -> Self {
        Self {
            export_wait_secs: 0,
        }
    }
}

impl MlokitConfig {
    /// Parse configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MlokitError::config(format!("Invalid TOML: {e}")))
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MlokitError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load: defaults, optional file, process environment, validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Apply `MLOKIT_*` overrides using `lookup` to read variables.
    pub fn merge_with_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MLOKIT_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = value.trim().parse().map_err(|_| {
                MlokitError::config(format!("MLOKIT_HTTP_TIMEOUT_SECS: not an integer: {value}"))
            })?;
        }
        if let Some(value) = lookup("MLOKIT_HTTP_USER_AGENT") {
            self.http.user_agent = value;
        }
        if let Some(value) = lookup("MLOKIT_HTTP_VERIFY_TLS") {
            self.http.verify_tls = parse_bool(&value).ok_or_else(|| {
                MlokitError::config(format!("MLOKIT_HTTP_VERIFY_TLS: not a boolean: {value}"))
            })?;
        }
        if let Some(value) = lookup("MLOKIT_STORAGE_API_VERSION") {
            self.storage.api_version = value;
        }
        if let Some(value) = lookup("MLOKIT_VERTEXAI_EXPORT_WAIT_SECS") {
            self.vertexai.export_wait_secs = value.trim().parse().map_err(|_| {
                MlokitError::config(format!(
                    "MLOKIT_VERTEXAI_EXPORT_WAIT_SECS: not an integer: {value}"
                ))
            })?;
        }
        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(MlokitError::config("http.timeout_secs must be greater than 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(MlokitError::config("http.user_agent must not be empty"));
        }
        if self.storage.api_version.trim().is_empty() {
            return Err(MlokitError::config("storage.api_version must not be empty"));
        }
        if self.walker.app_root_depth == 0 || self.walker.space_depth == 0 {
            return Err(MlokitError::config("walker depths must be greater than 0"));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
