//! Resolution data model
//!
//! Every value here is created from a live API response during one resolution
//! pass and dropped when the pass ends. Nothing is persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Azure Blob service domain suffix
pub const BLOB_DOMAIN: &str = "blob.core.windows.net";

/// Azure Files service domain suffix
pub const FILE_DOMAIN: &str = "file.core.windows.net";

/// Resolved location of one blob (or blob prefix) plus the long-lived key
/// needed to read or write it directly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCoordinate {
    /// Storage account name
    pub account: String,
    /// Container name
    pub container: String,
    /// Path inside the container; a trailing `/` marks a prefix
    pub relative_path: String,
    /// Base64 account key from the platform's datastore record
    pub credential: String,
}

impl StorageCoordinate {
    /// Create a new coordinate
    pub fn new(
        account: impl Into<String>,
        container: impl Into<String>,
        relative_path: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            container: container.into(),
            relative_path: relative_path.into(),
            credential: credential.into(),
        }
    }

    /// Coordinate of `name` under this one, by plain concatenation.
    pub fn child(&self, name: &str) -> Self {
        Self {
            relative_path: format!("{}{}", self.relative_path, name),
            ..self.clone()
        }
    }

    /// Relative path without leading slashes, as used in the blob URL
    pub fn blob_path(&self) -> &str {
        self.relative_path.trim_start_matches('/')
    }

    /// Fully qualified blob URL
    pub fn blob_url(&self) -> String {
        format!(
            "https://{}.{}/{}/{}",
            self.account,
            BLOB_DOMAIN,
            self.container,
            self.blob_path()
        )
    }
}

impl fmt::Debug for StorageCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCoordinate")
            .field("account", &self.account)
            .field("container", &self.container)
            .field("relative_path", &self.relative_path)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Storage service a content URI points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageSubtype {
    /// Azure Blob storage
    AzureBlob,
    /// Azure Files storage
    AzureFile,
    /// Neither known domain matched
    Unknown,
}

impl StorageSubtype {
    /// Detect the subtype by substring match on the known domain suffixes.
    pub fn detect(uri: &str) -> Self {
        if uri.contains(BLOB_DOMAIN) {
            Self::AzureBlob
        } else if uri.contains(FILE_DOMAIN) {
            Self::AzureFile
        } else {
            Self::Unknown
        }
    }

    /// Datastore type name as reported by the platform; empty for `Unknown`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureBlob => "AzureBlob",
            Self::AzureFile => "AzureFile",
            Self::Unknown => "",
        }
    }
}

impl fmt::Display for StorageSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-issued URL to one physical blob, split into its parts.
///
/// Grammar: `scheme://<account>.<domain>/<container>/<relative path><file name>?<sas>`.
/// Parts that cannot be located are left empty; parsing never fails.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentUri {
    /// Original URI including any SAS token
    pub raw: String,
    /// Storage service
    pub subtype: StorageSubtype,
    /// Storage account name with the domain suffix removed
    pub account: String,
    /// Container name (third `/` segment)
    pub container: String,
    /// Path between the container and the file name, usually ending in `/`
    pub relative_path: String,
    /// Blob file name (text between the last `/` and the first `?`)
    pub file_name: String,
    /// Inline SAS token (text after the first `?`)
    pub sas_token: Option<String>,
}

impl ContentUri {
    /// Parse a content URI.
    pub fn parse(raw: &str) -> Self {
        let subtype = StorageSubtype::detect(raw);
        let query_start = raw.find('?');

        let file_name = match (raw.rfind('/'), query_start) {
            (Some(slash), Some(query)) if slash < query => &raw[slash + 1..query],
            _ => "",
        };

        let segments: Vec<&str> = raw.split('/').collect();
        let account = segments
            .get(2)
            .map(|host| {
                host.replace(&format!(".{BLOB_DOMAIN}"), "")
                    .replace(&format!(".{FILE_DOMAIN}"), "")
            })
            .unwrap_or_default();
        let container = segments.get(3).copied().unwrap_or_default().to_string();

        let mut relative_path = String::new();
        if !container.is_empty() && !file_name.is_empty() {
            let marker = format!("/{container}/");
            let start = raw.find(&marker);
            let end = raw.find(&format!("{file_name}?"));
            if let (Some(start), Some(end)) = (start, end) {
                if end > start {
                    relative_path = raw[start..end].replace(&marker, "");
                }
            }
        }

        let sas_token = query_start
            .map(|idx| &raw[idx + 1..])
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Self {
            raw: raw.to_string(),
            subtype,
            account,
            container,
            relative_path,
            file_name: file_name.to_string(),
            sas_token,
        }
    }

    /// Name to persist a downloaded copy under: last path segment of the URL,
    /// or `artifact` when the path ends in `/`.
    pub fn download_file_name(&self) -> &str {
        let location = crate::errors::redact_query(&self.raw);
        let location = location
            .split_once("://")
            .map_or(location, |(_, rest)| rest);
        let path = location.find('/').map_or("", |idx| &location[idx..]);
        match path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => "artifact",
        }
    }
}

impl fmt::Debug for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentUri")
            .field("subtype", &self.subtype)
            .field("account", &self.account)
            .field("container", &self.container)
            .field("relative_path", &self.relative_path)
            .field("file_name", &self.file_name)
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Named blob content moved in or out of storage
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name or artifact path relative to its root
    pub name: String,
    /// Entire content
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Create an artifact
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Classification of a namespace node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A terminal resource worth emitting (e.g. a dataset)
    Leaf,
    /// A node whose children should be listed (folder, project, space)
    Container,
    /// Anything else; neither emitted nor descended into
    Other,
}

/// A node in a hierarchical namespace. The namespace may contain cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Node identifier; nodes with an empty id are ignored by walkers
    pub id: String,
    /// Display name, also used to build the accumulated path
    pub display_name: String,
    /// Classified node type
    pub kind: NodeKind,
    /// Type string exactly as reported by the platform
    pub raw_type: String,
    /// Parent container identifier, when reported
    pub parent_id: Option<String>,
    /// Creation timestamp, when reported
    pub created_time: Option<String>,
    /// Last update timestamp, when reported
    pub updated_time: Option<String>,
}

/// One batch of a cursor-paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Entities in this batch that decoded cleanly
    pub items: Vec<T>,
    /// Records the server sent, malformed ones included
    pub listed: usize,
    /// Cursor for the next batch; `None` ends the listing
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Page with an optional continuation cursor. An empty cursor string is
    /// treated as absent.
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        let listed = items.len();
        Self::decoded(items, listed, next_cursor)
    }

    /// Page where `listed` records arrived and only `items` survived decoding
    pub fn decoded(items: Vec<T>, listed: usize, next_cursor: Option<String>) -> Self {
        Self {
            listed: listed.max(items.len()),
            items,
            next_cursor: next_cursor.filter(|cursor| !cursor.is_empty()),
        }
    }

    /// Final page of a listing
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Empty final page
    pub fn empty() -> Self {
        Self::last(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_URI: &str = "https://mlstore01.blob.core.windows.net/azureml/ExperimentRun/dcid.run_7/outputs/model.pkl?sv=2019-07-07&sr=b&sig=abc%3D";

    #[test]
    fn test_parse_blob_content_uri() {
        let uri = ContentUri::parse(MODEL_URI);
        assert_eq!(uri.subtype, StorageSubtype::AzureBlob);
        assert_eq!(uri.account, "mlstore01");
        assert_eq!(uri.container, "azureml");
        assert_eq!(uri.file_name, "model.pkl");
        assert_eq!(uri.relative_path, "ExperimentRun/dcid.run_7/outputs/");
        assert_eq!(
            uri.sas_token.as_deref(),
            Some("sv=2019-07-07&sr=b&sig=abc%3D")
        );
        assert_eq!(uri.download_file_name(), "model.pkl");
    }

    #[test]
    fn test_parse_file_share_uri() {
        let uri =
            ContentUri::parse("https://share9.file.core.windows.net/code/users/a/train.py?sv=1");
        assert_eq!(uri.subtype, StorageSubtype::AzureFile);
        assert_eq!(uri.account, "share9");
        assert_eq!(uri.container, "code");
        assert_eq!(uri.relative_path, "users/a/");
        assert_eq!(uri.subtype.as_str(), "AzureFile");
    }

    #[test]
    fn test_parse_without_sas_leaves_path_empty() {
        let uri = ContentUri::parse("https://acct.blob.core.windows.net/c/dir/blob.bin");
        assert_eq!(uri.file_name, "");
        assert_eq!(uri.relative_path, "");
        assert_eq!(uri.sas_token, None);
        assert_eq!(uri.download_file_name(), "blob.bin");
    }

    #[test]
    fn test_parse_malformed_is_empty_not_error() {
        let uri = ContentUri::parse("not a uri");
        assert_eq!(uri.subtype, StorageSubtype::Unknown);
        assert_eq!(uri.account, "");
        assert_eq!(uri.container, "");
        assert_eq!(uri.relative_path, "");
        assert_eq!(uri.subtype.as_str(), "");
    }

    #[test]
    fn test_slash_inside_query_yields_no_file_name() {
        let uri = ContentUri::parse("https://acct.blob.core.windows.net/c/f.bin?x=a/b");
        assert_eq!(uri.file_name, "");
        assert_eq!(uri.relative_path, "");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let uri = ContentUri::parse(MODEL_URI);
        assert!(!format!("{uri:?}").contains("sig=abc"));

        let coord = StorageCoordinate::new("acct", "c", "p/", "c2VjcmV0");
        assert!(!format!("{coord:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn test_coordinate_child_and_url() {
        let coord = StorageCoordinate::new("acct", "models", "/runs/7/", "a2V5");
        let child = coord.child("weights.bin");
        assert_eq!(child.relative_path, "/runs/7/weights.bin");
        assert_eq!(
            child.blob_url(),
            "https://acct.blob.core.windows.net/models/runs/7/weights.bin"
        );
        assert_eq!(child.credential, coord.credential);
    }

    #[test]
    fn test_page_empty_cursor_is_absent() {
        let page = Page::new(vec![1, 2], Some(String::new()));
        assert_eq!(page.next_cursor, None);
        let page: Page<u8> = Page::empty();
        assert!(page.items.is_empty());
        assert_eq!(page.listed, 0);
    }

    #[test]
    fn test_page_counts_dropped_records() {
        let page: Page<u8> = Page::decoded(Vec::new(), 3, Some("c2".to_string()));
        assert!(page.items.is_empty());
        assert_eq!(page.listed, 3);
        assert_eq!(Page::decoded(vec![1, 2], 0, None).listed, 2);
    }
}
