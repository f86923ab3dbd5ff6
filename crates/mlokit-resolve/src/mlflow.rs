//! MLflow tracking server resolution
//!
//! A registered model name resolves to the run that produced its latest
//! listed version; the run's artifact tree is listed breadth-first and each
//! file fetched through the server's artifact proxy.

use crate::pagination::{collect_unique, PageSource};
use crate::response::{cursor_field, decode_list, get_metadata, listed_count, non_empty};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mlokit_core::{
    Artifact, CredentialShape, HttpEffects, HttpEffectsExt, MlokitError, Page, Result,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info, warn};
use url::Url;

/// MLflow credential: `username;password` for HTTP Basic auth. A password
/// containing `;` cannot be expressed and is rejected as a field-count error.
pub const MLFLOW_CREDENTIAL: CredentialShape =
    CredentialShape::exact("MLflow", 2, "username;password");

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelVersionRecord {
    name: Option<String>,
    version: Option<Value>,
    status: Option<String>,
    description: Option<String>,
    source: Option<String>,
    run_id: Option<String>,
}

/// One registered model (first listed version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVersion {
    /// Registered model name
    pub name: String,
    /// Version label
    pub version: String,
    /// Registration status
    pub status: String,
    /// Free-form description
    pub description: String,
    /// Artifact location the version was registered from
    pub source: String,
    /// Run that produced the version
    pub run_id: String,
}

impl From<ModelVersionRecord> for ModelVersion {
    fn from(record: ModelVersionRecord) -> Self {
        let version = match record.version {
            Some(Value::String(version)) => version,
            Some(Value::Number(version)) => version.to_string(),
            _ => String::new(),
        };
        Self {
            name: record.name.unwrap_or_default(),
            version,
            status: record.status.unwrap_or_default(),
            description: record.description.unwrap_or_default(),
            source: record.source.unwrap_or_default(),
            run_id: record.run_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileRecord {
    path: Option<String>,
    is_dir: Option<bool>,
}

/// URL layout of one tracking server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MlflowEndpoints {
    base_url: String,
}

impl MlflowEndpoints {
    /// Endpoints under `base_url`; a trailing `/` is ignored.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| MlokitError::invalid(format!("tracking server URL: {e}")))?;
        Ok(Self { base_url })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| MlokitError::invalid(format!("tracking server URL: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    /// One page of the model-version search
    pub fn search(&self, page_token: Option<&str>) -> Result<String> {
        let query: Vec<(&str, &str)> = page_token
            .map(|token| ("page_token", token))
            .into_iter()
            .collect();
        self.endpoint("/api/2.0/mlflow/model-versions/search", &query)
    }

    /// Artifact listing for a run, optionally below `path`
    pub fn artifacts(&self, run_id: &str, path: Option<&str>) -> Result<String> {
        let mut query = vec![("run_id", run_id)];
        if let Some(path) = path {
            query.push(("path", path));
        }
        self.endpoint("/api/2.0/mlflow/artifacts/list", &query)
    }

    /// Artifact content through the server proxy
    pub fn artifact_download(&self, run_id: &str, path: &str) -> Result<String> {
        self.endpoint("/get-artifact", &[("path", path), ("run_id", run_id)])
    }
}

/// Client for one tracking server
pub struct MlflowClient<'a, H: ?Sized> {
    http: &'a H,
    endpoints: MlflowEndpoints,
    headers: Vec<(String, String)>,
}

impl<'a, H> MlflowClient<'a, H>
where
    H: HttpEffects + ?Sized,
{
    /// Create a client for the server at `base_url` from a raw credential
    /// string (see [`MLFLOW_CREDENTIAL`]).
    pub fn new(http: &'a H, base_url: &str, credential: &str) -> Result<Self> {
        let credential = MLFLOW_CREDENTIAL.parse(credential)?;
        let endpoints = MlflowEndpoints::new(base_url)?;

        let user_pass = format!(
            "{}:{}",
            credential.field(0).unwrap_or_default(),
            credential.field(1).unwrap_or_default()
        );
        let authorization = format!("Basic {}", STANDARD.encode(user_pass));

        Ok(Self {
            http,
            endpoints,
            headers: vec![("Authorization".to_string(), authorization)],
        })
    }

    /// Endpoints of this client's server
    pub fn endpoints(&self) -> &MlflowEndpoints {
        &self.endpoints
    }

    async fn get(&self, url: &str) -> Result<Option<Value>> {
        get_metadata(self.http, url, &self.headers).await
    }

    /// Registered models, one entry per name (first version listed wins)
    pub async fn list_models(&self) -> Result<Vec<ModelVersion>> {
        let mut pages = VersionPages { client: self };
        collect_unique(&mut pages, |model: &ModelVersion| model.name.as_str()).await
    }

    /// Model by name, compared case-insensitively
    pub async fn find_model(&self, name: &str) -> Result<Option<ModelVersion>> {
        Ok(self
            .list_models()
            .await?
            .into_iter()
            .find(|model| model.name.to_lowercase() == name.to_lowercase()))
    }

    /// First entry of a run's artifact listing, which is the run's artifact
    /// root directory
    pub async fn artifact_root(&self, run_id: &str) -> Result<Option<String>> {
        let Some(body) = self.get(&self.endpoints.artifacts(run_id, None)?).await? else {
            return Ok(None);
        };
        Ok(decode_list::<FileRecord>(&body, "files", "artifact")
            .into_iter()
            .find_map(|file| non_empty(file.path)))
    }

    /// Every file below `path`, breadth-first
    pub async fn list_artifacts(&self, run_id: &str, path: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut queue = VecDeque::from([path.to_string()]);

        while let Some(dir) = queue.pop_front() {
            let Some(body) = self.get(&self.endpoints.artifacts(run_id, Some(&dir))?).await? else {
                continue;
            };
            for entry in decode_list::<FileRecord>(&body, "files", "artifact") {
                let Some(entry_path) = non_empty(entry.path) else {
                    continue;
                };
                if entry.is_dir.unwrap_or(false) {
                    queue.push_back(entry_path);
                } else {
                    files.push(entry_path);
                }
            }
        }
        debug!(run_id, files = files.len(), "Listed run artifacts");
        Ok(files)
    }

    /// One artifact's content
    pub async fn download_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.endpoints.artifact_download(run_id, path)?;
        self.http.get_bytes(&url, &self.headers).await
    }

    /// Every artifact of the run behind a registered model
    pub async fn download_model(&self, name: &str) -> Result<Option<Vec<Artifact>>> {
        let Some(model) = self.find_model(name).await? else {
            return Ok(None);
        };
        if model.run_id.is_empty() {
            warn!(model = %model.name, "Model version has no run id");
            return Ok(None);
        }

        let paths = match self.artifact_root(&model.run_id).await? {
            Some(root) => self.list_artifacts(&model.run_id, &root).await?,
            None => Vec::new(),
        };

        let mut artifacts = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = self.download_artifact(&model.run_id, &path).await?;
            artifacts.push(Artifact::new(path, bytes));
        }
        info!(model = %model.name, artifacts = artifacts.len(), "Model downloaded");
        Ok(Some(artifacts))
    }
}

struct VersionPages<'c, 'a, H: ?Sized> {
    client: &'c MlflowClient<'a, H>,
}

#[async_trait]
impl<'c, 'a, H> PageSource<ModelVersion> for VersionPages<'c, 'a, H>
where
    H: HttpEffects + ?Sized,
{
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page<ModelVersion>> {
        let url = self.client.endpoints.search(cursor)?;
        let Some(body) = self.client.get(&url).await? else {
            return Ok(Page::empty());
        };
        let versions = decode_list::<ModelVersionRecord>(&body, "model_versions", "model version")
            .into_iter()
            .map(ModelVersion::from)
            .collect();
        Ok(Page::decoded(
            versions,
            listed_count(&body, "model_versions"),
            cursor_field(&body, "next_page_token"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlokit_testkit::ScriptedHttp;

    #[test]
    fn test_endpoints_encode_query() {
        let http = ScriptedHttp::new();
        let client = MlflowClient::new(&http, "https://mlflow.local/", "alice;s3cret").unwrap();
        assert_eq!(
            client.endpoints().artifacts("r1", Some("model dir/data")).unwrap(),
            "https://mlflow.local/api/2.0/mlflow/artifacts/list?run_id=r1&path=model+dir%2Fdata"
        );
        assert_eq!(
            client.endpoints().search(None).unwrap(),
            "https://mlflow.local/api/2.0/mlflow/model-versions/search"
        );
    }

    #[test]
    fn test_basic_auth_header() {
        let http = ScriptedHttp::new();
        let client = MlflowClient::new(&http, "https://mlflow.local", "alice;s3cret").unwrap();
        // base64("alice:s3cret")
        assert_eq!(client.headers[0].1, "Basic YWxpY2U6czNjcmV0");
    }

    #[test]
    fn test_rejects_bad_credential_and_url() {
        let http = ScriptedHttp::new();
        assert!(matches!(
            MlflowClient::new(&http, "https://mlflow.local", "alice"),
            Err(MlokitError::Credential { .. })
        ));
        assert!(matches!(
            MlflowClient::new(&http, "not a url", "alice;pw"),
            Err(MlokitError::Invalid { .. })
        ));
    }
}
