//! Tree Reconciler
//!
//! Maps every source node onto a destination node, creating the missing
//! ones parent-first. Nodes are matched by path segment within the same
//! destination parent, never by full path across parents.

use std::collections::HashMap;
use tracing::{debug, info};

use super::providers::RoutingService;
use super::types::ResourceTree;
use crate::agents::error::{ReplicationError, Result};
use crate::agents::identity::CredentialContext;

/// (destination parent id, path segment) -> destination node id
#[derive(Debug, Clone)]
pub struct NodeIdentityMap {
    root_id: String,
    by_key: HashMap<(String, String), String>,
}

impl NodeIdentityMap {
    /// Build from the destination tree; the root is resolved by path "/"
    pub fn from_tree(tree: &ResourceTree) -> Result<Self> {
        let root_id = tree.root()?.id.clone();
        let by_key = tree
            .nodes
            .iter()
            .filter_map(|n| match (&n.parent_id, &n.path_part) {
                (Some(parent), Some(part)) if !n.is_root() => {
                    Some(((parent.clone(), part.clone()), n.id.clone()))
                }
                _ => None,
            })
            .collect();

        Ok(Self { root_id, by_key })
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn lookup(&self, parent_id: &str, path_part: &str) -> Option<&str> {
        self.by_key
            .get(&(parent_id.to_string(), path_part.to_string()))
            .map(String::as_str)
    }

    pub fn insert(&mut self, parent_id: &str, path_part: &str, node_id: &str) {
        self.by_key.insert(
            (parent_id.to_string(), path_part.to_string()),
            node_id.to_string(),
        );
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Result of reconciling a source tree onto a destination container
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Source node id -> destination node id, covering every source node
    pub mapping: HashMap<String, String>,
    /// Paths created at the destination, in creation order
    pub created: Vec<String>,
    pub reused: usize,
}

impl Reconciliation {
    pub fn destination_of(&self, source_id: &str) -> Result<&str> {
        self.mapping
            .get(source_id)
            .map(String::as_str)
            .ok_or_else(|| ReplicationError::lookup("destination resource", source_id))
    }
}

pub struct TreeReconciler<'a> {
    routing: &'a dyn RoutingService,
}

impl<'a> TreeReconciler<'a> {
    pub fn new(routing: &'a dyn RoutingService) -> Self {
        Self { routing }
    }

    /// Reconcile `source` against the already-fetched `destination` tree.
    ///
    /// The first failed creation aborts; nodes created before it remain.
    pub async fn reconcile(
        &self,
        ctx: &CredentialContext,
        source: &ResourceTree,
        destination: &ResourceTree,
    ) -> Result<Reconciliation> {
        let mut identity = NodeIdentityMap::from_tree(destination)?;
        let mut result = Reconciliation::default();

        for node in source.traversal_order()? {
            let (parent_id, path_part) = match (&node.parent_id, &node.path_part) {
                _ if node.is_root() => {
                    result
                        .mapping
                        .insert(node.id.clone(), identity.root_id().to_string());
                    continue;
                }
                (Some(parent), Some(part)) => (parent, part),
                _ => {
                    return Err(ReplicationError::MalformedTree(format!(
                        "resource {} has no path segment",
                        node.path
                    )))
                }
            };

            let dest_parent = result.destination_of(parent_id)?.to_string();

            let dest_id = match identity.lookup(&dest_parent, path_part) {
                Some(existing) => {
                    debug!(path = %node.path, resource = %existing, "Reusing destination resource");
                    result.reused += 1;
                    existing.to_string()
                }
                None => {
                    let created = self
                        .routing
                        .create_node(ctx, &destination.container_id, &dest_parent, path_part)
                        .await?;
                    info!(path = %node.path, resource = %created.id, "Created destination resource");
                    identity.insert(&dest_parent, path_part, &created.id);
                    result.created.push(node.path.clone());
                    created.id
                }
            };

            result.mapping.insert(node.id.clone(), dest_id);
        }

        info!(
            container = %destination.container_id,
            created = result.created.len(),
            reused = result.reused,
            "Reconciled resource tree"
        );

        Ok(result)
    }
}
