//! Vertex AI resolution
//!
//! Models live in per-region registries and have no blob behind them until
//! they are exported: the chain finds the model across regions, asks Vertex to
//! export it into the first project bucket that accepts the job, waits, then
//! lists the export prefix and fetches each object through its media link.
//! Datasets point straight at a `gs://` object.

use crate::pagination::{collect_pages, dedup_by_key, PageSource};
use crate::response::{
    cursor_field, decode_list, get_lenient, get_metadata, listed_count, non_empty,
};
use async_trait::async_trait;
use mlokit_core::{
    bearer, Artifact, CredentialShape, GcsUri, HttpEffects, HttpEffectsExt, MlokitError, Page,
    Result, SleepEffects, VertexConfig,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

/// Vertex AI credential: a single OAuth access token
pub const VERTEX_CREDENTIAL: CredentialShape =
    CredentialShape::exact("Vertex AI", 1, "access_token");

/// Export formats a model can be downloaded in, compared case-insensitively
pub const EXPORT_FORMATS: [&str; 6] = [
    "tflite",
    "edgetpu-tflite",
    "tf-saved-model",
    "tf-js",
    "core-ml",
    "custom-trained",
];

const RESOURCE_MANAGER_HOST: &str = "cloudresourcemanager.googleapis.com";
const API_GATEWAY_HOST: &str = "apigateway.googleapis.com";
const STORAGE_HOST: &str = "storage.googleapis.com";
const LISTING_FIELDS: &str = "items/name,nextPageToken";
const LISTING_PAGE_SIZE: &str = "1000";

fn google_url(host: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(&format!("https://{host}/"))
        .map_err(|e| MlokitError::invalid(format!("API host {host}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| MlokitError::invalid(format!("API host {host} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url.into())
}

fn with_page_token<'q>(
    mut query: Vec<(&'q str, &'q str)>,
    token: Option<&'q str>,
) -> Vec<(&'q str, &'q str)> {
    if let Some(token) = token {
        query.push(("pageToken", token));
    }
    query
}

/// URL layout of the Google APIs the chain calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexEndpoints;

impl VertexEndpoints {
    fn region_host(region: &str) -> Result<String> {
        let valid = !region.is_empty()
            && region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(MlokitError::invalid(format!("region {region:?} is not a region name")));
        }
        Ok(format!("{region}-aiplatform.googleapis.com"))
    }

    /// Active projects visible to the token
    pub fn projects(&self) -> Result<String> {
        google_url(
            RESOURCE_MANAGER_HOST,
            &["v1", "projects"],
            &[
                ("alt", "json"),
                ("filter", "lifecycleState:ACTIVE"),
                ("pageSize", "500"),
            ],
        )
    }

    /// Locations of a project
    pub fn locations(&self, project: &str) -> Result<String> {
        google_url(API_GATEWAY_HOST, &["v1", "projects", project, "locations"], &[])
    }

    /// Model registry of one region
    pub fn models(&self, project: &str, region: &str) -> Result<String> {
        google_url(
            &Self::region_host(region)?,
            &["v1", "projects", project, "locations", region, "models"],
            &[],
        )
    }

    /// Dataset registry of one region
    pub fn datasets(&self, project: &str, region: &str) -> Result<String> {
        google_url(
            &Self::region_host(region)?,
            &["v1", "projects", project, "locations", region, "datasets"],
            &[],
        )
    }

    /// Export job for a model
    pub fn export(&self, project: &str, region: &str, model_id: &str) -> Result<String> {
        let action = format!("{model_id}:export");
        google_url(
            &Self::region_host(region)?,
            &["v1", "projects", project, "locations", region, "models", &action],
            &[],
        )
    }

    /// One page of a project's bucket listing
    pub fn buckets(&self, project: &str, page_token: Option<&str>) -> Result<String> {
        let query = vec![
            ("alt", "json"),
            ("fields", LISTING_FIELDS),
            ("maxResults", LISTING_PAGE_SIZE),
            ("project", project),
            ("projection", "noAcl"),
        ];
        google_url(STORAGE_HOST, &["storage", "v1", "b"], &with_page_token(query, page_token))
    }

    /// One page of the objects under `prefix` in `bucket`
    pub fn objects(&self, bucket: &str, prefix: &str, page_token: Option<&str>) -> Result<String> {
        let query = vec![
            ("alt", "json"),
            ("prefix", prefix),
            ("fields", LISTING_FIELDS),
            ("maxResults", LISTING_PAGE_SIZE),
            ("projection", "noAcl"),
        ];
        google_url(
            STORAGE_HOST,
            &["storage", "v1", "b", bucket, "o"],
            &with_page_token(query, page_token),
        )
    }

    /// Metadata of one object; `/` inside the name is escaped
    pub fn object(&self, bucket: &str, object_name: &str) -> Result<String> {
        google_url(STORAGE_HOST, &["storage", "v1", "b", bucket, "o", object_name], &[])
    }
}

/// Last `/` segment of a resource name
fn short_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectRecord {
    name: Option<String>,
    project_id: Option<String>,
    project_number: Option<String>,
    lifecycle_state: Option<String>,
    create_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SourceInfo {
    source_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportFormatRecord {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ModelRecord {
    name: Option<String>,
    display_name: Option<String>,
    create_time: Option<String>,
    update_time: Option<String>,
    source_info: Option<SourceInfo>,
    supported_export_formats: Vec<ExportFormatRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DatasetRecord {
    name: Option<String>,
    display_name: Option<String>,
    create_time: Option<String>,
    update_time: Option<String>,
    metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameRecord {
    name: Option<String>,
}

/// A Google Cloud project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexProject {
    /// Display name
    pub name: String,
    /// Project id
    pub project_id: String,
    /// Project number
    pub project_number: String,
    /// Lifecycle state, e.g. `ACTIVE`
    pub lifecycle_state: String,
    /// Creation time
    pub create_time: String,
}

/// A registered model that can be exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexModel {
    /// Model id (last segment of the resource name)
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Creation time
    pub create_time: String,
    /// Update time
    pub update_time: String,
    /// How the model was produced, e.g. `AUTOML`
    pub source_type: String,
    /// First supported format from [`EXPORT_FORMATS`]
    pub export_format: String,
    /// Region whose registry lists the model
    pub region: String,
}

impl VertexModel {
    /// Models missing any field, or with no downloadable export format, are
    /// not reported.
    fn from_record(record: ModelRecord, region: &str) -> Option<Self> {
        let export_format = record
            .supported_export_formats
            .into_iter()
            .filter_map(|format| non_empty(format.id))
            .find(|id| EXPORT_FORMATS.contains(&id.to_ascii_lowercase().as_str()))?;
        let name = non_empty(record.name)?;
        Some(Self {
            id: short_id(&name).to_string(),
            display_name: non_empty(record.display_name)?,
            create_time: non_empty(record.create_time)?,
            update_time: non_empty(record.update_time)?,
            source_type: non_empty(record.source_info.and_then(|info| info.source_type))?,
            export_format,
            region: region.to_string(),
        })
    }
}

/// A dataset imported from Cloud Storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDataset {
    /// Dataset id (last segment of the resource name)
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Creation time
    pub create_time: String,
    /// Update time
    pub update_time: String,
    /// `gs://` source the dataset was imported from
    pub uri: String,
    /// Region whose registry lists the dataset
    pub region: String,
}

impl VertexDataset {
    fn from_record(record: DatasetRecord, region: &str) -> Option<Self> {
        let uri = record
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.pointer("/inputConfig/gcsSource/uri"))
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())?
            .to_string();
        let name = non_empty(record.name)?;
        Some(Self {
            id: short_id(&name).to_string(),
            display_name: non_empty(record.display_name)?,
            create_time: non_empty(record.create_time)?,
            update_time: non_empty(record.update_time)?,
            uri,
            region: region.to_string(),
        })
    }
}

/// Client for the Vertex AI and Cloud Storage APIs of one token
pub struct VertexAiClient<'a, H: ?Sized, S: ?Sized> {
    http: &'a H,
    sleep: &'a S,
    headers: Vec<(String, String)>,
    endpoints: VertexEndpoints,
    export_wait_ms: u64,
}

impl<'a, H, S> VertexAiClient<'a, H, S>
where
    H: HttpEffects + ?Sized,
    S: SleepEffects + ?Sized,
{
    /// Create a client from a raw credential string (see [`VERTEX_CREDENTIAL`]).
    pub fn new(http: &'a H, sleep: &'a S, config: &VertexConfig, credential: &str) -> Result<Self> {
        let credential = VERTEX_CREDENTIAL.parse(credential)?;
        Ok(Self {
            http,
            sleep,
            headers: vec![bearer(credential.field(0).unwrap_or_default())],
            endpoints: VertexEndpoints,
            export_wait_ms: config.export_wait_ms(),
        })
    }

    /// Endpoints the client calls
    pub fn endpoints(&self) -> &VertexEndpoints {
        &self.endpoints
    }

    /// Active projects visible to the token
    pub async fn list_projects(&self) -> Result<Vec<VertexProject>> {
        let Some(body) = get_metadata(self.http, &self.endpoints.projects()?, &self.headers).await?
        else {
            return Ok(Vec::new());
        };
        Ok(decode_list::<ProjectRecord>(&body, "projects", "project")
            .into_iter()
            .map(|record| VertexProject {
                name: record.name.unwrap_or_default(),
                project_id: record.project_id.unwrap_or_default(),
                project_number: record.project_number.unwrap_or_default(),
                lifecycle_state: record.lifecycle_state.unwrap_or_default(),
                create_time: record.create_time.unwrap_or_default(),
            })
            .collect())
    }

    /// Region names of a project, first occurrence order
    pub async fn list_regions(&self, project: &str) -> Result<Vec<String>> {
        let url = self.endpoints.locations(project)?;
        let Some(body) = get_metadata(self.http, &url, &self.headers).await? else {
            return Ok(Vec::new());
        };
        let regions: Vec<String> = decode_list::<NameRecord>(&body, "locations", "location")
            .into_iter()
            .filter_map(|record| non_empty(record.name))
            .filter(|name| name.contains('/'))
            .map(|name| short_id(&name).to_string())
            .collect();
        Ok(dedup_by_key(regions, String::as_str))
    }

    /// Exportable models in one region. A region without the service lists
    /// nothing.
    pub async fn list_models(&self, project: &str, region: &str) -> Result<Vec<VertexModel>> {
        let url = self.endpoints.models(project, region)?;
        let Some(body) = get_lenient(self.http, &url, &self.headers).await? else {
            return Ok(Vec::new());
        };
        let models = decode_list::<ModelRecord>(&body, "models", "model")
            .into_iter()
            .filter_map(|record| VertexModel::from_record(record, region))
            .collect();
        Ok(dedup_by_key(models, |model: &VertexModel| model.id.as_str()))
    }

    /// Datasets with a Cloud Storage source in one region
    pub async fn list_datasets(&self, project: &str, region: &str) -> Result<Vec<VertexDataset>> {
        let url = self.endpoints.datasets(project, region)?;
        let Some(body) = get_lenient(self.http, &url, &self.headers).await? else {
            return Ok(Vec::new());
        };
        let datasets = decode_list::<DatasetRecord>(&body, "datasets", "dataset")
            .into_iter()
            .filter_map(|record| VertexDataset::from_record(record, region))
            .collect();
        Ok(dedup_by_key(datasets, |dataset: &VertexDataset| dataset.id.as_str()))
    }

    /// First model across the project's regions whose id matches, ignoring case
    pub async fn find_model(&self, project: &str, model_id: &str) -> Result<Option<VertexModel>> {
        require(project, "project")?;
        require(model_id, "model id")?;
        for region in self.list_regions(project).await? {
            if let Some(model) = self
                .list_models(project, &region)
                .await?
                .into_iter()
                .find(|model| model.id.eq_ignore_ascii_case(model_id))
            {
                debug!(model_id, region = %region, "Model located");
                return Ok(Some(model));
            }
        }
        Ok(None)
    }

    /// First dataset across the project's regions whose id matches, ignoring case
    pub async fn find_dataset(
        &self,
        project: &str,
        dataset_id: &str,
    ) -> Result<Option<VertexDataset>> {
        require(project, "project")?;
        require(dataset_id, "dataset id")?;
        for region in self.list_regions(project).await? {
            if let Some(dataset) = self
                .list_datasets(project, &region)
                .await?
                .into_iter()
                .find(|dataset| dataset.id.eq_ignore_ascii_case(dataset_id))
            {
                return Ok(Some(dataset));
            }
        }
        Ok(None)
    }

    /// Bucket names of a project, following `nextPageToken`
    pub async fn list_buckets(&self, project: &str) -> Result<Vec<String>> {
        let mut pages = StoragePages {
            client: self,
            listing: Listing::Buckets { project },
        };
        collect_pages(&mut pages).await
    }

    /// Object names under `prefix`, following `nextPageToken`
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut pages = StoragePages {
            client: self,
            listing: Listing::Objects { bucket, prefix },
        };
        collect_pages(&mut pages).await
    }

    /// Start an export of `model` into `bucket`. Returns the export's
    /// `gs://` output location, or `None` when the bucket refused the job.
    pub async fn export_model(
        &self,
        project: &str,
        model: &VertexModel,
        bucket: &str,
    ) -> Result<Option<String>> {
        let url = self.endpoints.export(project, &model.region, &model.id)?;
        let payload = json!({
            "outputConfig": {
                "exportFormatId": model.export_format,
                "artifactDestination": { "outputUriPrefix": format!("gs://{bucket}") },
            }
        });
        let (status, body) = self.http.post_json(&url, &self.headers, &payload).await?;
        if status != 200 {
            debug!(bucket, status, "Export refused");
            return Ok(None);
        }
        Ok(body
            .as_ref()
            .and_then(|body| body.get("artifactOutputUri"))
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .map(str::to_string))
    }

    /// Download link of one object, or `None` when it cannot be read
    pub async fn media_link(&self, bucket: &str, object_name: &str) -> Result<Option<String>> {
        let url = self.endpoints.object(bucket, object_name)?;
        let Some(body) = get_lenient(self.http, &url, &self.headers).await? else {
            return Ok(None);
        };
        Ok(body
            .get("mediaLink")
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(str::to_string))
    }

    /// Content behind a media link
    pub async fn download_media(&self, media_link: &str) -> Result<Vec<u8>> {
        self.http.get_bytes(media_link, &self.headers).await
    }

    /// Export a model and download every object of the export, named relative
    /// to the export location.
    pub async fn download_model(
        &self,
        project: &str,
        model_id: &str,
    ) -> Result<Option<Vec<Artifact>>> {
        let Some(model) = self.find_model(project, model_id).await? else {
            return Ok(None);
        };

        let mut output = None;
        for bucket in self.list_buckets(project).await? {
            output = self.export_model(project, &model, &bucket).await?;
            if output.is_some() {
                break;
            }
        }
        let Some(output) = output else {
            warn!(model_id, "No bucket accepted the model export");
            return Ok(None);
        };

        self.sleep.sleep_ms(self.export_wait_ms).await;

        let Some(location) = GcsUri::parse(&output) else {
            warn!(model_id, "Export location is not a gs:// URI");
            return Ok(None);
        };
        let prefix = location.prefix();

        let mut artifacts = Vec::new();
        for name in self.list_objects(&location.bucket, &prefix).await? {
            if name.ends_with('/') {
                continue;
            }
            let Some(link) = self.media_link(&location.bucket, &name).await? else {
                continue;
            };
            let bytes = self.download_media(&link).await?;
            let relative = name.strip_prefix(prefix.as_str()).unwrap_or(&name);
            artifacts.push(Artifact::new(relative, bytes));
        }

        info!(
            model_id,
            bucket = %location.bucket,
            artifacts = artifacts.len(),
            "Model export downloaded"
        );
        Ok(Some(artifacts))
    }

    /// Download the Cloud Storage object a dataset was imported from
    pub async fn download_dataset(
        &self,
        project: &str,
        dataset_id: &str,
    ) -> Result<Option<Artifact>> {
        let Some(dataset) = self.find_dataset(project, dataset_id).await? else {
            return Ok(None);
        };
        let Some(location) = GcsUri::parse(&dataset.uri).filter(|uri| !uri.path.is_empty()) else {
            warn!(dataset_id, "Dataset source is not a gs:// object");
            return Ok(None);
        };
        let Some(link) = self.media_link(&location.bucket, &location.path).await? else {
            return Ok(None);
        };
        let bytes = self.download_media(&link).await?;
        info!(dataset_id, bytes = bytes.len(), "Dataset downloaded");
        Ok(Some(Artifact::new(short_id(&location.path), bytes)))
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MlokitError::invalid(format!("{what} is empty")));
    }
    Ok(())
}

enum Listing<'c> {
    Buckets { project: &'c str },
    Objects { bucket: &'c str, prefix: &'c str },
}

struct StoragePages<'c, 'a, H: ?Sized, S: ?Sized> {
    client: &'c VertexAiClient<'a, H, S>,
    listing: Listing<'c>,
}

#[async_trait]
impl<'c, 'a, H, S> PageSource<String> for StoragePages<'c, 'a, H, S>
where
    H: HttpEffects + ?Sized,
    S: SleepEffects + ?Sized,
{
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page<String>> {
        let endpoints = &self.client.endpoints;
        let url = match self.listing {
            Listing::Buckets { project } => endpoints.buckets(project, cursor)?,
            Listing::Objects { bucket, prefix } => endpoints.objects(bucket, prefix, cursor)?,
        };
        let Some(body) = get_lenient(self.client.http, &url, &self.client.headers).await? else {
            return Ok(Page::empty());
        };
        let names = decode_list::<NameRecord>(&body, "items", "storage item")
            .into_iter()
            .filter_map(|record| non_empty(record.name))
            .collect();
        Ok(Page::decoded(
            names,
            listed_count(&body, "items"),
            cursor_field(&body, "nextPageToken"),
        ))
    }
}
