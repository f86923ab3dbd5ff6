//! Palantir Foundry resolution
//!
//! Foundry has no storage coordinates to resolve: datasets are read and
//! written through the platform API. What needs resolving is *which* datasets
//! exist, which means walking the compass filesystem from an application
//! folder or from every space.

use crate::pagination::{collect_pages, dedup_by_key, PageSource};
use crate::response::{
    cursor_field, decode_item, decode_list, get_metadata, listed_count, non_empty,
};
use crate::walker::{walk_roots, walk_tree, TreeSource, WalkRoot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mlokit_core::errors::redact_query;
use mlokit_core::{
    bearer, ClockEffects, CredentialShape, HttpEffects, HttpEffectsExt, HttpRequest, MlokitError,
    NodeKind, Page, Result, TreeNode, WalkerConfig,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Foundry credential: `token;tenant[;app_rid]`. A fourth field is rejected
/// rather than ignored.
pub const PALANTIR_CREDENTIAL: CredentialShape =
    CredentialShape::range("Palantir", 2, 3, "token;tenant[;app_rid]");

/// Node type of a dataset
pub const DATASET_TYPE: &str = "FOUNDRY_DATASET";

/// Node types whose children are listed
pub const CONTAINER_TYPES: [&str; 4] = ["FOLDER", "PROJECT", "SPACE", "COMPASS_FOLDER"];

/// Classify a Foundry node type
pub fn classify(raw_type: &str) -> NodeKind {
    if raw_type == DATASET_TYPE {
        NodeKind::Leaf
    } else if CONTAINER_TYPES.contains(&raw_type) {
        NodeKind::Container
    } else {
        NodeKind::Other
    }
}

/// Multipart boundary derived from the current time
pub fn form_boundary(now: DateTime<Utc>) -> String {
    format!("----WebKitFormBoundary{:x}", now.timestamp_millis())
}

/// Single-file `multipart/form-data` body under field name `file`
pub fn multipart_file_body(boundary: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    );
    let tail = format!("\r\n--{boundary}--\r\n");

    let mut body = Vec::with_capacity(head.len() + content.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(tail.as_bytes());
    body
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NodeRecord {
    rid: Option<String>,
    display_name: Option<String>,
    #[serde(rename = "type")]
    node_type: Option<String>,
    created_time: Option<String>,
    updated_time: Option<String>,
    parent_folder_rid: Option<String>,
    path: Option<String>,
}

impl From<NodeRecord> for TreeNode {
    fn from(record: NodeRecord) -> Self {
        let raw_type = record.node_type.unwrap_or_default();
        TreeNode {
            id: record.rid.unwrap_or_default(),
            display_name: record.display_name.unwrap_or_default(),
            kind: classify(&raw_type),
            raw_type,
            parent_id: non_empty(record.parent_folder_rid),
            created_time: non_empty(record.created_time),
            updated_time: non_empty(record.updated_time),
        }
    }
}

/// A top-level space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    /// Space rid
    pub rid: String,
    /// Display name
    pub display_name: String,
}

/// Folder metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    /// Display name
    pub display_name: String,
    /// Full compass path
    pub path: String,
    /// Node type
    pub node_type: String,
}

/// A dataset found by [`PalantirClient::list_datasets`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundryDataset {
    /// Dataset rid
    pub rid: String,
    /// Display name
    pub name: String,
    /// Path of display names from the walk root
    pub path: String,
    /// Creation time, `Unknown` when not reported
    pub created_time: String,
    /// Update time, `Unknown` when not reported
    pub updated_time: String,
    /// Folder the dataset sits in
    pub parent_folder_rid: String,
}

/// URL layout of one Foundry tenant's v2 API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundryEndpoints {
    tenant: String,
}

impl FoundryEndpoints {
    /// Endpoints for the tenant host, e.g. `acme.palantirfoundry.com`
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
        }
    }

    /// Tenant host
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}/api/v2/{path}", self.tenant)
    }

    /// Space listing
    pub fn spaces(&self) -> String {
        self.url("filesystem/spaces?preview=true")
    }

    /// One page of a folder's children
    pub fn children(&self, folder_rid: &str, page_token: Option<&str>) -> String {
        let base = self.url(&format!("filesystem/folders/{folder_rid}/children?preview=true"));
        match page_token {
            Some(token) => format!("{base}&pageToken={token}"),
            None => base,
        }
    }

    /// Folder metadata
    pub fn folder(&self, folder_rid: &str) -> String {
        self.url(&format!("filesystem/folders/{folder_rid}?preview=true"))
    }

    /// Dataset metadata
    pub fn dataset(&self, dataset_rid: &str) -> String {
        self.url(&format!("datasets/{dataset_rid}"))
    }

    /// Dataset contents as CSV
    pub fn read_table(&self, dataset_rid: &str) -> String {
        self.url(&format!("datasets/{dataset_rid}/readTable?format=csv"))
    }

    /// Dataset creation
    pub fn create_dataset(&self) -> String {
        self.url("datasets")
    }

    /// File upload into a dataset
    pub fn dataset_files(&self, dataset_rid: &str) -> String {
        self.url(&format!("datasets/{dataset_rid}/files"))
    }
}

/// Client for one Foundry tenant
pub struct PalantirClient<'a, H: ?Sized, C: ?Sized> {
    http: &'a H,
    clock: &'a C,
    headers: Vec<(String, String)>,
    endpoints: FoundryEndpoints,
    app_rid: Option<String>,
    walker: WalkerConfig,
}

impl<'a, H, C> PalantirClient<'a, H, C>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    /// Create a client from a raw credential string (see [`PALANTIR_CREDENTIAL`]).
    pub fn new(http: &'a H, clock: &'a C, walker: WalkerConfig, credential: &str) -> Result<Self> {
        let credential = PALANTIR_CREDENTIAL.parse(credential)?;
        Ok(Self {
            http,
            clock,
            headers: vec![bearer(credential.field(0).unwrap_or_default())],
            endpoints: FoundryEndpoints::new(credential.field(1).unwrap_or_default()),
            app_rid: credential.optional_field(2).map(str::to_string),
            walker,
        })
    }

    /// Application folder rid, when the credential names one
    pub fn app_rid(&self) -> Option<&str> {
        self.app_rid.as_deref()
    }

    /// Endpoints of this client's tenant
    pub fn endpoints(&self) -> &FoundryEndpoints {
        &self.endpoints
    }

    /// Every space the token can see
    pub async fn list_spaces(&self) -> Result<Vec<Space>> {
        let Some(body) = get_metadata(self.http, &self.endpoints.spaces(), &self.headers).await? else {
            return Ok(Vec::new());
        };
        Ok(decode_list::<NodeRecord>(&body, "data", "space")
            .into_iter()
            .map(|record| Space {
                rid: record.rid.unwrap_or_default(),
                display_name: record.display_name.unwrap_or_default(),
            })
            .collect())
    }

    /// All children of a folder, following `nextPageToken`
    pub async fn folder_children(&self, folder_rid: &str) -> Result<Vec<TreeNode>> {
        let mut pages = ChildPages {
            client: self,
            folder_rid,
        };
        collect_pages(&mut pages).await
    }

    /// Folder metadata, or `None` when it does not exist
    pub async fn folder_info(&self, folder_rid: &str) -> Result<Option<FolderInfo>> {
        let Some(body) = get_metadata(self.http, &self.endpoints.folder(folder_rid), &self.headers).await?
        else {
            return Ok(None);
        };
        Ok(decode_item::<NodeRecord>(&body, "folder").map(|record| FolderInfo {
            display_name: record.display_name.unwrap_or_default(),
            path: record.path.unwrap_or_default(),
            node_type: record.node_type.unwrap_or_default(),
        }))
    }

    /// Every dataset reachable from the application folder, or from every
    /// space when there is no application folder or it holds none.
    /// Deduplicated by rid; sample content is excluded.
    pub async fn list_datasets(&self) -> Result<Vec<FoundryDataset>> {
        let mut leaves = Vec::new();

        if let Some(app_rid) = self.app_rid.as_deref() {
            let label = self
                .folder_info(app_rid)
                .await?
                .map(|info| info.display_name)
                .unwrap_or_default();
            leaves = walk_tree(self, app_rid, &label, self.walker.app_root_depth, 0).await?;
            debug!(datasets = leaves.len(), "Walked application folder");
        }

        if leaves.is_empty() {
            let roots: Vec<WalkRoot> = self
                .list_spaces()
                .await?
                .into_iter()
                .map(|space| WalkRoot::new(space.rid, space.display_name))
                .collect();
            leaves = walk_roots(self, &roots, self.walker.space_depth).await?;
            debug!(spaces = roots.len(), datasets = leaves.len(), "Walked spaces");
        }

        let datasets = leaves
            .into_iter()
            .map(|leaf| FoundryDataset {
                rid: leaf.node.id,
                name: leaf.node.display_name,
                path: leaf.path,
                created_time: leaf.node.created_time.unwrap_or_else(|| "Unknown".to_string()),
                updated_time: leaf.node.updated_time.unwrap_or_else(|| "Unknown".to_string()),
                parent_folder_rid: leaf.parent_id,
            })
            .collect();
        Ok(dedup_by_key(datasets, |dataset: &FoundryDataset| dataset.rid.as_str()))
    }

    /// Raw dataset metadata
    pub async fn dataset_details(&self, dataset_rid: &str) -> Result<Option<Value>> {
        get_metadata(self.http, &self.endpoints.dataset(dataset_rid), &self.headers).await
    }

    /// Dataset contents rendered as CSV
    pub async fn download_dataset_csv(&self, dataset_rid: &str) -> Result<Vec<u8>> {
        let url = self.endpoints.read_table(dataset_rid);
        let body = self.http.get_bytes(&url, &self.headers).await?;
        info!(dataset_rid, bytes = body.len(), "Dataset downloaded");
        Ok(body)
    }

    /// Create a dataset in the application folder and upload one file into
    /// it. Returns the new dataset's rid.
    pub async fn upload_dataset(
        &self,
        dataset_name: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<String> {
        if dataset_name.trim().is_empty() {
            return Err(MlokitError::invalid("dataset name is empty"));
        }

        let create_url = self.endpoints.create_dataset();
        let payload = json!({
            "name": dataset_name,
            "parentFolderRid": self.app_rid.as_deref().unwrap_or_default(),
        });
        let (status, body) = self.http.post_json(&create_url, &self.headers, &payload).await?;
        if !matches!(status, 200 | 201) {
            return Err(MlokitError::status(status, &create_url));
        }
        let dataset_rid = body
            .as_ref()
            .and_then(|body| body.get("rid"))
            .and_then(Value::as_str)
            .filter(|rid| !rid.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                MlokitError::serialization("dataset creation response carries no rid")
            })?;
        debug!(dataset_rid = %dataset_rid, "Dataset created");

        let boundary = form_boundary(self.clock.now_utc());
        let upload_url = self.endpoints.dataset_files(&dataset_rid);
        let request = HttpRequest::post(upload_url.as_str())
            .with_header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .with_headers(self.headers.iter().cloned())
            .with_body(multipart_file_body(&boundary, file_name, content));
        let response = self.http.execute(request).await?;
        if !matches!(response.status, 200 | 201) {
            return Err(MlokitError::status(response.status, &upload_url));
        }

        info!(
            dataset_rid = %dataset_rid,
            url = redact_query(&upload_url),
            bytes = content.len(),
            "Dataset uploaded"
        );
        Ok(dataset_rid)
    }
}

#[async_trait]
impl<'a, H, C> TreeSource for PalantirClient<'a, H, C>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    async fn children(&self, node_id: &str) -> Result<Vec<TreeNode>> {
        self.folder_children(node_id).await
    }
}

struct ChildPages<'c, 'a, H: ?Sized, C: ?Sized> {
    client: &'c PalantirClient<'a, H, C>,
    folder_rid: &'c str,
}

#[async_trait]
impl<'c, 'a, H, C> PageSource<TreeNode> for ChildPages<'c, 'a, H, C>
where
    H: HttpEffects + ?Sized,
    C: ClockEffects + ?Sized,
{
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page<TreeNode>> {
        let url = self.client.endpoints.children(self.folder_rid, cursor);
        let Some(body) = get_metadata(self.client.http, &url, &self.client.headers).await? else {
            return Ok(Page::empty());
        };
        let nodes = decode_list::<NodeRecord>(&body, "data", "folder child")
            .into_iter()
            .map(TreeNode::from)
            .collect();
        Ok(Page::decoded(
            nodes,
            listed_count(&body, "data"),
            cursor_field(&body, "nextPageToken"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classify() {
        assert_eq!(classify("FOUNDRY_DATASET"), NodeKind::Leaf);
        assert_eq!(classify("COMPASS_FOLDER"), NodeKind::Container);
        assert_eq!(classify("SPACE"), NodeKind::Container);
        assert_eq!(classify("FOUNDRY_NOTEBOOK"), NodeKind::Other);
        assert_eq!(classify(""), NodeKind::Other);
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_file_body("----B", "iris.csv", b"a,b\n1,2");
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "------B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"iris.csv\"\r\nContent-Type: application/octet-stream\r\n\r\na,b\n1,2\r\n------B--\r\n"
        );
    }

    #[test]
    fn test_form_boundary_is_hex_millis() {
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        // 1577836800000 ms
        assert_eq!(form_boundary(now), "----WebKitFormBoundary16f5e66e800");
    }
}
