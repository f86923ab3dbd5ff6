//! # MLOKit Resolve - Resolution Chains
//!
//! Turns a coarse identifier on an ML platform (a model id, a dataset id, a
//! registered model name) into the concrete storage locations or API
//! endpoints holding its bytes, then hands off to the transfer executor.
//!
//! ## Building blocks
//!
//! - [`pagination`]: cursor-following listing plus first-wins dedup
//! - [`walker`]: depth-bounded walk of folder-like namespaces
//!
//! ## Platforms
//!
//! - [`azureml`]: model → asset → prefixes → content URIs → datastore key
//! - [`palantir`]: filesystem walk for datasets, CSV download, dataset upload
//! - [`mlflow`]: registered model → run → artifact tree
//! - [`vertexai`]: model → region → export into a bucket → `gs://` objects
//! - [`clearml`]: key pair → session token → model upload URL
//! - [`bigml`]: dataset export and model PMML through query-string auth
//!
//! Every call is sequential and awaited before the next is issued. A missing
//! field or a 404 anywhere in a chain resolves to `Ok(None)` (or an empty
//! list); any other non-2xx status is an error. Nothing is retried.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod azureml;
pub mod bigml;
pub mod clearml;
pub mod mlflow;
pub mod pagination;
pub mod palantir;
mod response;
pub mod vertexai;
pub mod walker;

pub use azureml::{
    AzureMlClient, DatasetSummary, DatastoreSummary, ModelArtifacts, ModelSummary, WorkspaceScope,
};
pub use bigml::BigMlClient;
pub use clearml::ClearMlClient;
pub use mlflow::{MlflowClient, MlflowEndpoints, ModelVersion};
pub use pagination::{collect_pages, collect_unique, dedup_by_key, PageSource};
pub use palantir::{FolderInfo, FoundryDataset, FoundryEndpoints, PalantirClient, Space};
pub use vertexai::{VertexAiClient, VertexDataset, VertexEndpoints, VertexModel, VertexProject};
pub use walker::{is_decoy, walk_roots, walk_tree, LeafEntry, TreeSource, WalkRoot};
