//! ClearML model resolution
//!
//! The API server hands out a session token for an access key pair; a model id
//! then resolves to the URL its weights were uploaded to. Only URLs reachable
//! over plain HTTP(S) are fetched; object-store schemes are reported, not
//! followed.

use crate::response::metadata_body;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mlokit_core::{
    bearer, Artifact, CredentialShape, HttpEffects, HttpEffectsExt, MlokitError, Result,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

/// ClearML credential: `access_key;secret_key`
pub const CLEARML_CREDENTIAL: CredentialShape =
    CredentialShape::exact("ClearML", 2, "access_key;secret_key");

const UNFETCHABLE_PREFIXES: [&str; 5] = ["file://", "/", "s3://", "gs://", "azure://"];

/// Whether a model URL can be fetched with a plain GET
pub fn is_http_fetchable(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty()
        && !UNFETCHABLE_PREFIXES
            .iter()
            .any(|prefix| url.starts_with(prefix))
}

/// File name for a downloaded model: the URL's last path segment, query
/// ignored, or `<model_id>.model` when the URL ends in `/`.
pub fn model_file_name(url: &str, model_id: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{model_id}.model"),
    }
}

/// Client for one ClearML API server
pub struct ClearMlClient<'a, H: ?Sized> {
    http: &'a H,
    api_url: String,
    basic: (String, String),
}

impl<'a, H> ClearMlClient<'a, H>
where
    H: HttpEffects + ?Sized,
{
    /// Create a client for the API server at `api_url` from a raw credential
    /// string (see [`CLEARML_CREDENTIAL`]).
    pub fn new(http: &'a H, api_url: &str, credential: &str) -> Result<Self> {
        let credential = CLEARML_CREDENTIAL.parse(credential)?;
        let api_url = api_url.trim_end_matches('/').to_string();
        Url::parse(&api_url).map_err(|e| MlokitError::invalid(format!("ClearML API URL: {e}")))?;

        let key_pair = format!(
            "{}:{}",
            credential.field(0).unwrap_or_default(),
            credential.field(1).unwrap_or_default()
        );
        Ok(Self {
            http,
            api_url,
            basic: (
                "Authorization".to_string(),
                format!("Basic {}", STANDARD.encode(key_pair)),
            ),
        })
    }

    fn endpoint(&self, call: &str) -> String {
        format!("{}/{call}", self.api_url)
    }

    /// Exchange the key pair for a session token
    pub async fn login(&self) -> Result<String> {
        let url = self.endpoint("auth.login");
        let (status, body) = self
            .http
            .post_json(&url, std::slice::from_ref(&self.basic), &json!({}))
            .await?;
        if status != 200 {
            return Err(MlokitError::status(status, &url));
        }
        body.as_ref()
            .and_then(|body| body.pointer("/data/token"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| MlokitError::credential("ClearML", "login returned no token"))
    }

    /// URL the model's weights were uploaded to, or `None` for an unknown
    /// model or one without an upload
    pub async fn model_url(&self, model_id: &str) -> Result<Option<String>> {
        if model_id.trim().is_empty() {
            return Err(MlokitError::invalid("model id is empty"));
        }
        let token = self.login().await?;
        let url = self.endpoint("models.get_by_id");
        let (status, body) = self
            .http
            .post_json(&url, &[bearer(&token)], &json!({ "models": [model_id] }))
            .await?;
        let Some(body) = metadata_body(status, body, &url)? else {
            return Ok(None);
        };
        Ok(body
            .pointer("/data/models/0/uri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .map(str::to_string))
    }

    /// Download a model's weights. The upload URL is fetched without
    /// credentials; a non-HTTP upload location is an invalid-input error.
    pub async fn download_model(&self, model_id: &str) -> Result<Option<Artifact>> {
        let Some(url) = self.model_url(model_id).await? else {
            warn!(model_id, "Model has no upload URL");
            return Ok(None);
        };
        if !is_http_fetchable(&url) {
            return Err(MlokitError::invalid(format!(
                "model {model_id} is stored at {url}, which needs object-store access"
            )));
        }
        debug!(model_id, "Fetching model weights");
        let bytes = self.http.get_bytes(&url, &[]).await?;
        info!(model_id, bytes = bytes.len(), "Model downloaded");
        Ok(Some(Artifact::new(model_file_name(&url, model_id), bytes)))
    }
}
