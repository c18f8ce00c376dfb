//! Resource Tree Fetcher

use tracing::{debug, info};

use super::providers::RoutingService;
use super::types::ResourceTree;
use crate::agents::error::Result;
use crate::agents::identity::CredentialContext;

/// Read-only retrieval of a container's full node set
pub struct TreeFetcher<'a> {
    routing: &'a dyn RoutingService,
}

impl<'a> TreeFetcher<'a> {
    pub fn new(routing: &'a dyn RoutingService) -> Self {
        Self { routing }
    }

    /// Fetch every node and its bound verbs; the tree must have a reachable root
    pub async fn fetch(&self, ctx: &CredentialContext, container_id: &str) -> Result<ResourceTree> {
        debug!(container = %container_id, scope = %ctx.scope(), "Fetching resource tree");

        let nodes = self.routing.list_nodes(ctx, container_id).await?;
        let tree = ResourceTree::new(container_id, nodes);
        tree.traversal_order()?;

        info!(
            container = %container_id,
            scope = %ctx.scope(),
            resources = tree.nodes.len(),
            methods = tree.method_count(),
            "Fetched resource tree"
        );

        Ok(tree)
    }
}
