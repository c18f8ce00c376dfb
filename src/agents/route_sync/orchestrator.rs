//! Route Replication Orchestrator
//!
//! Sequences fetch -> reconcile -> replicate -> deploy. Source reads run
//! under the source context; every destination call runs under the
//! destination context.

use std::sync::Arc;
use tracing::{info, warn};

use super::deploy::DeploymentTrigger;
use super::fetcher::TreeFetcher;
use super::methods::MethodReplicator;
use super::providers::{PermissionRegistry, RoutingService};
use super::reconciler::TreeReconciler;
use super::types::{ReplicationOutcome, RouteSyncReport, RoutingContainer};
use crate::agents::config::ReplicatorConfig;
use crate::agents::error::Result;
use crate::agents::function_sync::FunctionAddress;
use crate::agents::identity::CredentialContext;

/// Replicates the API trigger of one function into another account
pub struct RouteReplicator {
    routing: Arc<dyn RoutingService>,
    permissions: Arc<dyn PermissionRegistry>,
    config: ReplicatorConfig,
}

impl RouteReplicator {
    pub fn new(
        routing: Arc<dyn RoutingService>,
        permissions: Arc<dyn PermissionRegistry>,
        config: ReplicatorConfig,
    ) -> Self {
        Self {
            routing,
            permissions,
            config,
        }
    }

    pub async fn run(
        &self,
        source_ctx: &CredentialContext,
        destination_ctx: &CredentialContext,
        source_fn: &FunctionAddress,
        destination_fn: &FunctionAddress,
    ) -> Result<ReplicationOutcome> {
        let routing = self.routing.as_ref();

        // 1. Source container bound to the function by name
        source_ctx.ensure_fresh()?;
        let Some(source_api) = self.find_source(source_ctx, &source_fn.name).await? else {
            info!(function = %source_fn.name, "No API trigger present");
            return Ok(ReplicationOutcome::NoTrigger {
                function_name: source_fn.name.clone(),
            });
        };

        // 2. Source tree
        source_ctx.ensure_fresh()?;
        let source_tree = TreeFetcher::new(routing)
            .fetch(source_ctx, &source_api.id)
            .await?;

        // 3. Destination container
        let (destination_api, container_created) = self
            .locate_or_create(destination_ctx, &source_api)
            .await?;

        // 4. Reconcile, replicate, deploy
        let destination_tree = TreeFetcher::new(routing)
            .fetch(destination_ctx, &destination_api.id)
            .await?;

        let reconciliation = TreeReconciler::new(routing)
            .reconcile(destination_ctx, &source_tree, &destination_tree)
            .await?;

        let methods = MethodReplicator::new(
            routing,
            self.permissions.as_ref(),
            self.config.permission_strategy,
            self.config.resume,
        )
        .replicate(
            destination_ctx,
            &source_tree,
            &destination_tree,
            &reconciliation,
            destination_fn,
        )
        .await?;

        let deployment = DeploymentTrigger::new(routing)
            .deploy(destination_ctx, &destination_api.id)
            .await?;

        Ok(ReplicationOutcome::Replicated(RouteSyncReport {
            source_container_id: source_api.id,
            destination_container_id: destination_api.id,
            container_created,
            nodes_created: reconciliation.created,
            nodes_reused: reconciliation.reused,
            methods_created: methods.methods_created,
            integrations_put: methods.integrations_put,
            permissions_granted: methods.permissions_granted,
            permissions_reused: methods.permissions_reused,
            pairs_skipped: methods.skipped,
            deployment,
        }))
    }

    async fn find_source(
        &self,
        ctx: &CredentialContext,
        function_name: &str,
    ) -> Result<Option<RoutingContainer>> {
        let mut matches = self.routing.find_containers(ctx, function_name).await?;
        if matches.len() > 1 {
            warn!(
                function = %function_name,
                count = matches.len(),
                "Several APIs match the function name, using the first"
            );
        }
        Ok((!matches.is_empty()).then(|| matches.remove(0)))
    }

    async fn locate_or_create(
        &self,
        ctx: &CredentialContext,
        source: &RoutingContainer,
    ) -> Result<(RoutingContainer, bool)> {
        let existing = self.routing.find_containers(ctx, &source.name).await?;
        if existing.len() > 1 {
            warn!(
                name = %source.name,
                count = existing.len(),
                "Several destination APIs share the name, using the first"
            );
        }
        if let Some(api) = existing.into_iter().next() {
            info!(api = %api.id, name = %api.name, "Found existing destination API");
            return Ok((api, false));
        }

        let api = self
            .routing
            .create_container(ctx, &source.name, source.description.as_deref())
            .await?;
        info!(api = %api.id, name = %api.name, "Created destination API");
        Ok((api, true))
    }
}
