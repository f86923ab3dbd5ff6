//! AzureML resolution chains
//!
//! Model artifacts live in the workspace's registered blob datastores. The
//! chain is: model → asset id (from the model's `url`) → artifact prefixes →
//! content URIs → datastore whose (account, container, type) matches → the
//! datastore's stored account key. Datasets resolve more directly through
//! their `azureFilePath` and named datastore.

use crate::pagination::{collect_unique, PageSource};
use crate::response::{
    cursor_field, decode_item, decode_list, get_metadata, listed_count, non_empty,
};
use async_trait::async_trait;
use mlokit_core::{
    bearer, extract_asset_id, Artifact, AzureFilePath, ClockEffects, ContentUri, CredentialShape,
    HttpEffects, MlokitError, Page, Result, StorageConfig, StorageCoordinate,
};
use mlokit_transport::BlobTransfer;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

/// AzureML credential: a single management bearer token
pub const AZUREML_CREDENTIAL: CredentialShape = CredentialShape::exact("AzureML", 1, "token");

/// `api-version` for model management and artifact calls
pub const API_VERSION: &str = "2023-10-01";

const PROVIDER: &str = "providers/Microsoft.MachineLearningServices/workspaces";

/// Identifies one workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceScope {
    /// Subscription id
    pub subscription_id: String,
    /// Azure region, e.g. `eastus`
    pub region: String,
    /// Resource group name
    pub resource_group: String,
    /// Workspace name
    pub workspace: String,
}

impl WorkspaceScope {
    /// Create a scope; every component is required.
    pub fn new(
        subscription_id: impl Into<String>,
        region: impl Into<String>,
        resource_group: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Result<Self> {
        let scope = Self {
            subscription_id: subscription_id.into(),
            region: region.into(),
            resource_group: resource_group.into(),
            workspace: workspace.into(),
        };
        for (name, value) in [
            ("subscription id", &scope.subscription_id),
            ("region", &scope.region),
            ("resource group", &scope.resource_group),
            ("workspace", &scope.workspace),
        ] {
            if value.trim().is_empty() {
                return Err(MlokitError::invalid(format!("workspace {name} is empty")));
            }
        }
        Ok(scope)
    }

    fn workspace_path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/{}/{}",
            self.subscription_id, self.resource_group, PROVIDER, self.workspace
        )
    }

    fn model_management(&self) -> String {
        format!(
            "https://{}.modelmanagement.azureml.net/modelmanagement/v1.0/{}",
            self.region,
            self.workspace_path()
        )
    }

    fn experiments(&self, service: &str) -> String {
        format!(
            "https://{}.experiments.azureml.net/{service}/{}",
            self.region,
            self.workspace_path()
        )
    }

    /// First page of the model listing
    pub fn models_url(&self) -> String {
        format!("{}/models?api-version={API_VERSION}", self.model_management())
    }

    /// One model
    pub fn model_url(&self, model_id: &str) -> String {
        format!(
            "{}/models/{model_id}?api-version={API_VERSION}",
            self.model_management()
        )
    }

    /// One asset and its artifact prefixes
    pub fn asset_url(&self, asset_id: &str) -> String {
        format!(
            "{}/assets/{asset_id}?api-version={API_VERSION}",
            self.model_management()
        )
    }

    /// Content URIs under one artifact prefix
    pub fn content_info_url(&self, prefix: &str) -> String {
        format!(
            "{}/artifacts/prefix/contentinfo/{prefix}?api-version={API_VERSION}",
            self.experiments("artifact/v2.0")
        )
    }

    /// Every registered datastore
    pub fn datastores_url(&self) -> String {
        format!("{}/datastores?count=1000", self.experiments("datastore/v1.0"))
    }

    /// One datastore, including its stored credential
    pub fn datastore_url(&self, name: &str) -> String {
        format!("{}/datastores/{name}", self.experiments("datastore/v1.0"))
    }

    /// One dataset with its latest definition
    pub fn dataset_url(&self, dataset_id: &str) -> String {
        format!(
            "{}/datasets/{dataset_id}?includeInvisible=false&pageSize=100&includeLatestDefinition=true",
            self.experiments("dataset/v1.0")
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ModelRecord {
    id: Option<String>,
    name: Option<String>,
    model_type: Option<String>,
    created_time: Option<String>,
    modified_time: Option<String>,
    provisioning_state: Option<String>,
    url: Option<String>,
}

/// A registered model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    /// Model id (`name:version`)
    pub id: String,
    /// Model name
    pub name: String,
    /// Framework/type label
    pub model_type: String,
    /// Creation timestamp
    pub created_time: String,
    /// Last modification timestamp
    pub modified_time: String,
    /// Provisioning state; only reported by single-model lookups
    pub provisioning_state: String,
    /// Asset id extracted from the model's `url`
    pub asset_id: Option<String>,
}

impl ModelSummary {
    fn from_record(record: ModelRecord, fallback_id: Option<&str>) -> Option<Self> {
        let id = non_empty(record.id).or_else(|| fallback_id.map(str::to_string))?;
        Some(Self {
            id,
            name: record.name.unwrap_or_default(),
            model_type: record.model_type.unwrap_or_default(),
            created_time: record.created_time.unwrap_or_default(),
            modified_time: record.modified_time.unwrap_or_default(),
            provisioning_state: record.provisioning_state.unwrap_or_default(),
            asset_id: record.url.as_deref().and_then(extract_asset_id),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DatastoreRecord {
    name: Option<String>,
    account_name: Option<String>,
    container_name: Option<String>,
    endpoint: Option<String>,
    credential: Option<String>,
    datastore_type: Option<String>,
}

/// A registered datastore
#[derive(Clone, PartialEq, Eq)]
pub struct DatastoreSummary {
    /// Datastore name
    pub name: String,
    /// Storage account
    pub account_name: String,
    /// Container
    pub container_name: String,
    /// Storage endpoint suffix
    pub endpoint: String,
    /// Stored account key (base64); populated by single-datastore lookups
    pub credential: String,
    /// `AzureBlob`, `AzureFile`, ...
    pub datastore_type: String,
}

impl DatastoreSummary {
    /// Datastore payloads nest their fields under `properties` in some API
    /// versions and not in others.
    fn from_value(value: &Value) -> Option<Self> {
        let props = value
            .get("properties")
            .filter(|props| props.is_object())
            .unwrap_or(value);
        let record: DatastoreRecord = decode_item(props, "datastore")?;
        Some(Self {
            name: record.name.unwrap_or_default(),
            account_name: record.account_name.unwrap_or_default(),
            container_name: record.container_name.unwrap_or_default(),
            endpoint: record.endpoint.unwrap_or_default(),
            credential: record.credential.unwrap_or_default(),
            datastore_type: record.datastore_type.unwrap_or_default(),
        })
    }

    /// Case-insensitive match on (account, container, storage type)
    pub fn matches(&self, location: &ContentUri) -> bool {
        self.account_name.eq_ignore_ascii_case(&location.account)
            && self.container_name.eq_ignore_ascii_case(&location.container)
            && self
                .datastore_type
                .eq_ignore_ascii_case(location.subtype.as_str())
    }
}

impl fmt::Debug for DatastoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatastoreSummary")
            .field("name", &self.name)
            .field("account_name", &self.account_name)
            .field("container_name", &self.container_name)
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("datastore_type", &self.datastore_type)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DatasetRecord {
    id: Option<String>,
    name: Option<String>,
    state: Option<String>,
    data_type: Option<String>,
    datastore_name: Option<String>,
    azure_file_path: Option<String>,
}

/// A registered dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    /// Dataset id
    pub id: String,
    /// Dataset name
    pub name: String,
    /// Lifecycle state
    pub state: String,
    /// Tabular, file, ...
    pub data_type: String,
    /// Datastore holding the data
    pub datastore_name: String,
    /// `https://<account host>/<container>/<path>`
    pub azure_file_path: String,
}

impl DatasetSummary {
    /// Final component of the file path
    pub fn file_name(&self) -> &str {
        self.azure_file_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ArtifactRecord {
    artifact_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ContentInfoRecord {
    content_uri: Option<String>,
}

/// A model and the content URIs of all its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    /// The model
    pub model: ModelSummary,
    /// One entry per physical blob, each carrying its own SAS token
    pub content_uris: Vec<ContentUri>,
}

/// Client for one AzureML workspace
pub struct AzureMlClient<'a, H: ?Sized, C: ?Sized> {
    http: &'a H,
    transfer: BlobTransfer<'a, H, C>,
    headers: Vec<(String, String)>,
    scope: WorkspaceScope,
}

impl<'a, H, C> AzureMlClient<'a, H, C>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    /// Create a client from a raw credential string (see [`AZUREML_CREDENTIAL`]).
    pub fn new(
        http: &'a H,
        clock: &'a C,
        storage: &StorageConfig,
        credential: &str,
        scope: WorkspaceScope,
    ) -> Result<Self> {
        let credential = AZUREML_CREDENTIAL.parse(credential)?;
        let token = credential.field(0).unwrap_or_default();
        Ok(Self {
            http,
            transfer: BlobTransfer::new(http, clock, storage),
            headers: vec![bearer(token)],
            scope,
        })
    }

    /// The workspace this client targets
    pub fn scope(&self) -> &WorkspaceScope {
        &self.scope
    }

    async fn get(&self, url: &str) -> Result<Option<Value>> {
        get_metadata(self.http, url, &self.headers).await
    }

    /// Every registered model, following `nextLink`, deduplicated by id.
    pub async fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let mut pages = ModelPages { client: self };
        let models = collect_unique(&mut pages, |model: &ModelSummary| model.id.as_str()).await?;
        debug!(count = models.len(), "Listed models");
        Ok(models)
    }

    /// One model, or `None` when it does not exist.
    pub async fn get_model(&self, model_id: &str) -> Result<Option<ModelSummary>> {
        let Some(body) = self.get(&self.scope.model_url(model_id)).await? else {
            return Ok(None);
        };
        let Some(record) = decode_item::<ModelRecord>(&body, "model") else {
            return Ok(None);
        };
        Ok(ModelSummary::from_record(record, Some(model_id)))
    }

    /// Artifact prefixes registered for an asset
    pub async fn asset_prefixes(&self, asset_id: &str) -> Result<Vec<String>> {
        let Some(body) = self.get(&self.scope.asset_url(asset_id)).await? else {
            return Ok(Vec::new());
        };
        Ok(decode_list::<ArtifactRecord>(&body, "artifacts", "artifact")
            .into_iter()
            .filter_map(|record| non_empty(record.artifact_prefix))
            .collect())
    }

    /// Content URIs under an artifact prefix
    pub async fn content_uris(&self, prefix: &str) -> Result<Vec<ContentUri>> {
        let Some(body) = self.get(&self.scope.content_info_url(prefix)).await? else {
            return Ok(Vec::new());
        };
        Ok(decode_list::<ContentInfoRecord>(&body, "value", "content info")
            .into_iter()
            .filter_map(|record| non_empty(record.content_uri))
            .map(|uri| ContentUri::parse(&uri))
            .collect())
    }

    /// Every registered datastore. Listings do not include stored keys.
    pub async fn list_datastores(&self) -> Result<Vec<DatastoreSummary>> {
        let Some(body) = self.get(&self.scope.datastores_url()).await? else {
            return Ok(Vec::new());
        };
        Ok(body
            .get("value")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(DatastoreSummary::from_value).collect())
            .unwrap_or_default())
    }

    /// One datastore including its stored key
    pub async fn get_datastore(&self, name: &str) -> Result<Option<DatastoreSummary>> {
        let Some(body) = self.get(&self.scope.datastore_url(name)).await? else {
            return Ok(None);
        };
        Ok(DatastoreSummary::from_value(&body))
    }

    /// One dataset
    pub async fn get_dataset(&self, dataset_id: &str) -> Result<Option<DatasetSummary>> {
        let Some(body) = self.get(&self.scope.dataset_url(dataset_id)).await? else {
            return Ok(None);
        };
        let Some(record) = decode_item::<DatasetRecord>(&body, "dataset") else {
            return Ok(None);
        };
        Ok(Some(DatasetSummary {
            id: non_empty(record.id).unwrap_or_else(|| dataset_id.to_string()),
            name: record.name.unwrap_or_default(),
            state: record.state.unwrap_or_default(),
            data_type: record.data_type.unwrap_or_default(),
            datastore_name: record.datastore_name.unwrap_or_default(),
            azure_file_path: record.azure_file_path.unwrap_or_default(),
        }))
    }

    /// Model plus the content URIs of every artifact under every prefix.
    ///
    /// `None` when the model does not exist or its metadata carries no asset id.
    pub async fn resolve_model_artifacts(&self, model_id: &str) -> Result<Option<ModelArtifacts>> {
        let Some(model) = self.get_model(model_id).await? else {
            return Ok(None);
        };
        let Some(asset_id) = model.asset_id.clone() else {
            warn!(model_id, "Model metadata has no asset id");
            return Ok(None);
        };

        let mut content_uris = Vec::new();
        for prefix in self.asset_prefixes(&asset_id).await? {
            content_uris.extend(self.content_uris(&prefix).await?);
        }
        debug!(model_id, uris = content_uris.len(), "Resolved model artifacts");
        Ok(Some(ModelArtifacts {
            model,
            content_uris,
        }))
    }

    /// Resolve where a model's artifacts are stored and the key that can write
    /// there.
    ///
    /// Prefixes are visited in order. The relative path of the last content
    /// URI seen (across all prefixes) is the one used, and the last datastore
    /// matching a prefix's location supplies the name and container.
    pub async fn resolve_model_storage(&self, model_id: &str) -> Result<Option<StorageCoordinate>> {
        let Some(model) = self.get_model(model_id).await? else {
            return Ok(None);
        };
        let Some(asset_id) = model.asset_id else {
            warn!(model_id, "Model metadata has no asset id");
            return Ok(None);
        };

        let mut datastores: Option<Vec<DatastoreSummary>> = None;
        let mut datastore_name = String::new();
        let mut container = String::new();
        let mut relative_path = String::new();

        for prefix in self.asset_prefixes(&asset_id).await? {
            let Some(location) = self.content_uris(&prefix).await?.pop() else {
                continue;
            };
            relative_path = location.relative_path.clone();
            debug!(
                account = %location.account,
                container = %location.container,
                subtype = %location.subtype,
                path = %relative_path,
                "Artifact location"
            );

            if datastores.is_none() {
                datastores = Some(self.list_datastores().await?);
            }
            let candidates = datastores.as_deref().unwrap_or_default();
            for datastore in candidates.iter().filter(|ds| ds.matches(&location)) {
                datastore_name = datastore.name.clone();
                container = datastore.container_name.clone();
            }
        }

        if datastore_name.is_empty() {
            warn!(model_id, "No datastore matches the model's artifact location");
            return Ok(None);
        }
        let Some(datastore) = self.get_datastore(&datastore_name).await? else {
            return Ok(None);
        };
        if datastore.account_name.is_empty() || datastore.credential.is_empty() {
            warn!(datastore = %datastore_name, "Datastore has no stored account key");
            return Ok(None);
        }

        let coordinate = StorageCoordinate::new(
            datastore.account_name,
            container,
            relative_path,
            datastore.credential,
        );
        info!(model_id, datastore = %datastore_name, ?coordinate, "Resolved model storage");
        Ok(Some(coordinate))
    }

    /// Resolve a dataset's blob from its `azureFilePath` and datastore.
    pub async fn resolve_dataset_storage(&self, dataset_id: &str) -> Result<Option<StorageCoordinate>> {
        let Some(dataset) = self.get_dataset(dataset_id).await? else {
            return Ok(None);
        };
        let Some(path) = AzureFilePath::parse(&dataset.azure_file_path) else {
            warn!(dataset_id, "Dataset has no usable azureFilePath");
            return Ok(None);
        };
        if dataset.datastore_name.is_empty() {
            warn!(dataset_id, "Dataset names no datastore");
            return Ok(None);
        }
        let Some(datastore) = self.get_datastore(&dataset.datastore_name).await? else {
            return Ok(None);
        };
        if datastore.account_name.is_empty() || datastore.credential.is_empty() {
            warn!(datastore = %dataset.datastore_name, "Datastore has no stored account key");
            return Ok(None);
        }

        let coordinate = StorageCoordinate::new(
            datastore.account_name,
            path.container,
            path.relative_path,
            datastore.credential,
        );
        info!(dataset_id, ?coordinate, "Resolved dataset storage");
        Ok(Some(coordinate))
    }

    /// Download every artifact of a model through its SAS-bearing content URIs.
    pub async fn download_model(&self, model_id: &str) -> Result<Option<Vec<Artifact>>> {
        let Some(resolved) = self.resolve_model_artifacts(model_id).await? else {
            return Ok(None);
        };
        let mut artifacts = Vec::with_capacity(resolved.content_uris.len());
        for uri in &resolved.content_uris {
            let bytes = self.transfer.download_url(&uri.raw).await?;
            artifacts.push(Artifact::new(uri.download_file_name(), bytes));
        }
        info!(model_id, artifacts = artifacts.len(), "Model downloaded");
        Ok(Some(artifacts))
    }

    /// Overwrite a model's stored artifacts: each artifact is PUT at the
    /// resolved path plus its name. Returns the coordinates written.
    pub async fn poison_model(
        &self,
        model_id: &str,
        artifacts: Vec<Artifact>,
    ) -> Result<Option<Vec<StorageCoordinate>>> {
        if artifacts.is_empty() {
            return Err(MlokitError::invalid("no artifacts to upload"));
        }
        let Some(storage) = self.resolve_model_storage(model_id).await? else {
            return Ok(None);
        };

        let mut written = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let target = storage.child(&artifact.name);
            self.transfer.upload(&target, artifact.bytes).await?;
            written.push(target);
        }
        info!(model_id, artifacts = written.len(), "Model artifacts replaced");
        Ok(Some(written))
    }

    /// Download a dataset's blob, named after its file.
    pub async fn download_dataset(&self, dataset_id: &str) -> Result<Option<Artifact>> {
        let Some(storage) = self.resolve_dataset_storage(dataset_id).await? else {
            return Ok(None);
        };
        let bytes = self.transfer.download(&storage).await?;
        let name = storage
            .relative_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(Some(Artifact::new(name, bytes)))
    }
}

struct ModelPages<'c, 'a, H: ?Sized, C: ?Sized> {
    client: &'c AzureMlClient<'a, H, C>,
}

#[async_trait]
impl<'c, 'a, H, C> PageSource<ModelSummary> for ModelPages<'c, 'a, H, C>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page<ModelSummary>> {
        let url = match cursor {
            Some(next_link) => next_link.to_string(),
            None => self.client.scope.models_url(),
        };
        let Some(body) = self.client.get(&url).await? else {
            return Ok(Page::empty());
        };
        let models = decode_list::<ModelRecord>(&body, "value", "model")
            .into_iter()
            .filter_map(|record| ModelSummary::from_record(record, None))
            .collect();
        Ok(Page::decoded(
            models,
            listed_count(&body, "value"),
            cursor_field(&body, "nextLink"),
        ))
    }
}
