//! Depth-bounded namespace walker
//!
//! Walks a folder-like hierarchy depth-first, in listing order, collecting
//! leaf nodes with their accumulated display path. The hierarchy may contain
//! cycles; the depth bound is what stops a walk, there is no visited set.

use crate::pagination::dedup_by_key;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use mlokit_core::{NodeKind, Result, TreeNode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Display-name markers of vendor-seeded sample content
pub const DECOY_NAME_MARKERS: [&str; 2] = ["AIP Now Ontology", "[Example]"];

/// Path marker of vendor-seeded sample content
pub const DECOY_PATH_MARKER: &str = "[Example]";

/// Source of child listings
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Direct children of `node_id`, in listing order
    async fn children(&self, node_id: &str) -> Result<Vec<TreeNode>>;
}

/// A leaf found by a walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafEntry {
    /// The leaf as listed
    pub node: TreeNode,
    /// `/`-joined display names from the walk root
    pub path: String,
    /// Reported parent, or the container it was listed under
    pub parent_id: String,
}

/// True for sample content that should never be reported.
pub fn is_decoy(display_name: &str, path: &str) -> bool {
    DECOY_NAME_MARKERS
        .iter()
        .any(|marker| display_name.contains(marker))
        || path.contains(DECOY_PATH_MARKER)
}

/// `parent/name`, or just `name` under an empty parent path
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Walk from `node_id` (labelled `path`), listing children while
/// `current_depth < max_depth`.
///
/// Children with an empty id are ignored and decoys are skipped whatever their
/// type. Leaves are emitted; containers are descended into at `current_depth + 1`;
/// anything else is ignored.
pub fn walk_tree<'a, S>(
    source: &'a S,
    node_id: &'a str,
    path: &'a str,
    max_depth: usize,
    current_depth: usize,
) -> BoxFuture<'a, Result<Vec<LeafEntry>>>
where
    S: TreeSource + ?Sized,
{
    async move {
        if current_depth >= max_depth {
            return Ok(Vec::new());
        }

        let children = source.children(node_id).await?;
        trace!(node_id, depth = current_depth, children = children.len(), "Listed container");

        let mut leaves = Vec::new();
        for child in children {
            if child.id.is_empty() {
                continue;
            }
            let item_path = child_path(path, &child.display_name);
            if is_decoy(&child.display_name, &item_path) {
                debug!(path = %item_path, "Skipping sample content");
                continue;
            }

            match child.kind {
                NodeKind::Leaf => {
                    let parent_id = child
                        .parent_id
                        .clone()
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| node_id.to_string());
                    leaves.push(LeafEntry {
                        node: child,
                        path: item_path,
                        parent_id,
                    });
                }
                NodeKind::Container => {
                    let nested =
                        walk_tree(source, &child.id, &item_path, max_depth, current_depth + 1)
                            .await?;
                    leaves.extend(nested);
                }
                NodeKind::Other => {}
            }
        }
        Ok(leaves)
    }
    .boxed()
}

/// A starting point for [`walk_roots`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkRoot {
    /// Container id to start from
    pub id: String,
    /// Path label for the root itself
    pub label: String,
}

impl WalkRoot {
    /// Create a root
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Walk each root in order and deduplicate leaves by id, first occurrence
/// winning. Roots with an empty id are skipped.
pub async fn walk_roots<S>(source: &S, roots: &[WalkRoot], max_depth: usize) -> Result<Vec<LeafEntry>>
where
    S: TreeSource + ?Sized,
{
    let mut leaves = Vec::new();
    for root in roots.iter().filter(|root| !root.id.is_empty()) {
        leaves.extend(walk_tree(source, &root.id, &root.label, max_depth, 0).await?);
    }
    Ok(dedup_by_key(leaves, |leaf| leaf.node.id.as_str()))
}
