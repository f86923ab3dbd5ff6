//! Fixed-grammar identifier parsers
//!
//! Platform metadata embeds identifiers inside compound URL-like fields. These
//! functions are the only places that slice those fields; malformed input
//! yields `None` rather than an error.

use serde::{Deserialize, Serialize};

/// Position of the asset id in a `/`-split model URL (`aml://asset/<id>`).
pub const ASSET_ID_SEGMENT: usize = 3;

/// Extract the asset id from a model's compound `url` field.
///
/// Grammar: `<scheme>:` `/` `` `/` `<kind>` `/` `<asset id>` [`/` ...]. The
/// field is split on `/` and the segment at index 3 is returned when present
/// and non-empty.
pub fn extract_asset_id(url: &str) -> Option<String> {
    url.split('/')
        .nth(ASSET_ID_SEGMENT)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// A dataset's `azureFilePath`, e.g.
/// `https://account.blob.core.windows.net/container/dir/file.csv`.
///
/// Grammar: at least five `/` segments; segment 2 is the storage host, segment
/// 3 the container and segments 4.. the relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureFilePath {
    /// Storage host exactly as written in the path
    pub storage_host: String,
    /// Container name
    pub container: String,
    /// Path inside the container
    pub relative_path: String,
}

impl AzureFilePath {
    /// Minimum number of `/`-separated segments for a usable path
    pub const MIN_SEGMENTS: usize = 5;

    /// Parse an `azureFilePath` field.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < Self::MIN_SEGMENTS {
            return None;
        }
        Some(Self {
            storage_host: segments[2].to_string(),
            container: segments[3].to_string(),
            relative_path: segments[4..].join("/"),
        })
    }

    /// Final path component, used as the dataset's file name
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// A Cloud Storage location, `gs://<bucket>[/<path>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsUri {
    /// Bucket name
    pub bucket: String,
    /// Object name or prefix inside the bucket, possibly empty
    pub path: String,
}

impl GcsUri {
    /// URI scheme
    pub const SCHEME: &'static str = "gs://";

    /// Parse a `gs://` URI. Surrounding whitespace is ignored; anything
    /// without the scheme or without a bucket yields `None`.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix(Self::SCHEME)?;
        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return None;
        }
        Some(Self {
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }

    /// The path as a listing prefix: surrounding `/` trimmed, then a single
    /// trailing `/` unless the path is empty.
    pub fn prefix(&self) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_asset_id() {
        assert_eq!(
            extract_asset_id("aml://asset/3f1c2a7e9b8d4c6e"),
            Some("3f1c2a7e9b8d4c6e".to_string())
        );
        assert_eq!(
            extract_asset_id("aml://asset/abc/extra"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_extract_asset_id_malformed() {
        assert_eq!(extract_asset_id(""), None);
        assert_eq!(extract_asset_id("aml://asset"), None);
        assert_eq!(extract_asset_id("aml://asset/"), None);
        assert_eq!(extract_asset_id("no-slashes"), None);
    }

    #[test]
    fn test_azure_file_path() {
        let parsed = AzureFilePath::parse(
            "https://mlstore01.blob.core.windows.net/datasets/UI/2023/iris.csv",
        )
        .unwrap();
        assert_eq!(parsed.storage_host, "mlstore01.blob.core.windows.net");
        assert_eq!(parsed.container, "datasets");
        assert_eq!(parsed.relative_path, "UI/2023/iris.csv");
        assert_eq!(parsed.file_name(), "iris.csv");
    }

    #[test]
    fn test_gcs_uri() {
        let uri = GcsUri::parse(" gs://exports/model-123/tf-saved-model/2024/ ").unwrap();
        assert_eq!(uri.bucket, "exports");
        assert_eq!(uri.path, "model-123/tf-saved-model/2024/");
        assert_eq!(uri.prefix(), "model-123/tf-saved-model/2024/");

        let bare = GcsUri::parse("gs://exports").unwrap();
        assert_eq!(bare.path, "");
        assert_eq!(bare.prefix(), "");
    }

    #[test]
    fn test_gcs_uri_malformed() {
        assert_eq!(GcsUri::parse("s3://bucket/key"), None);
        assert_eq!(GcsUri::parse("gs:///key"), None);
        assert_eq!(GcsUri::parse(""), None);
    }

    #[test]
    fn test_azure_file_path_too_short() {
        assert_eq!(
            AzureFilePath::parse("https://acct.blob.core.windows.net/container"),
            None
        );
        assert_eq!(AzureFilePath::parse(""), None);
    }
}
