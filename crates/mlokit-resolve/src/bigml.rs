//! BigML resolution
//!
//! BigML authenticates with `username` and `api_key` query parameters on
//! every call, so URLs built here carry secrets and are only logged redacted.

use crate::response::get_metadata;
use mlokit_core::errors::redact_query;
use mlokit_core::{Artifact, CredentialShape, HttpEffects, HttpEffectsExt, MlokitError, Result};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// BigML credential: `username;api_key`
pub const BIGML_CREDENTIAL: CredentialShape =
    CredentialShape::exact("BigML", 2, "username;api_key");

/// Public BigML API
pub const BIGML_API: &str = "https://bigml.io";

/// Strip a `<kind>/` resource prefix, so `dataset/abc` and `abc` name the same
/// resource.
fn resource_id<'s>(kind: &str, id: &'s str) -> Result<&'s str> {
    let id = id.trim();
    let id = id
        .strip_prefix(kind)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(id);
    if id.is_empty() || id.contains('/') {
        return Err(MlokitError::invalid(format!("{kind} id {id:?} is not a resource id")));
    }
    Ok(id)
}

/// Client for one BigML account
pub struct BigMlClient<'a, H: ?Sized> {
    http: &'a H,
    base_url: String,
    username: String,
    api_key: String,
}

impl<'a, H> BigMlClient<'a, H>
where
    H: HttpEffects + ?Sized,
{
    /// Create a client for the API at `base_url` (normally [`BIGML_API`])
    /// from a raw credential string (see [`BIGML_CREDENTIAL`]).
    pub fn new(http: &'a H, base_url: &str, credential: &str) -> Result<Self> {
        let mut fields = BIGML_CREDENTIAL.parse(credential)?.into_fields().into_iter();
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| MlokitError::invalid(format!("BigML API URL: {e}")))?;
        Ok(Self {
            http,
            base_url,
            username: fields.next().unwrap_or_default(),
            api_key: fields.next().unwrap_or_default(),
        })
    }

    /// Authenticated URL for `path`, with any extra query pairs after the
    /// credentials
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))
            .map_err(|e| MlokitError::invalid(format!("BigML URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("username", &self.username)
            .append_pair("api_key", &self.api_key)
            .extend_pairs(query);
        Ok(url.into())
    }

    /// Source data of a dataset, as BigML exports it
    pub async fn download_dataset(&self, dataset_id: &str) -> Result<Artifact> {
        let id = resource_id("dataset", dataset_id)?;
        let url = self.url(&format!("dataset/{id}/download"), &[])?;
        debug!(url = redact_query(&url), "Downloading dataset");
        let headers = [("Content-Type".to_string(), "application/json".to_string())];
        let bytes = self.http.get_bytes(&url, &headers).await?;
        info!(dataset_id = id, bytes = bytes.len(), "Dataset downloaded");
        Ok(Artifact::new(format!("{id}.csv"), bytes))
    }

    /// PMML rendition of a model, or `None` when the model is unknown or has
    /// no PMML export
    pub async fn model_pmml(&self, model_id: &str) -> Result<Option<String>> {
        let id = resource_id("model", model_id)?;
        let url = self.url(&format!("model/{id}"), &[("pmml", "yes")])?;
        let Some(body) = get_metadata(self.http, &url, &[]).await? else {
            return Ok(None);
        };
        Ok(body
            .get("pmml")
            .and_then(Value::as_str)
            .filter(|pmml| !pmml.is_empty())
            .map(str::to_string))
    }
}
