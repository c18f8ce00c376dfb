//! Replication Pipeline
//!
//! Source credentials, then the function copy, then its API trigger. The
//! first failure ends the run and nothing already created is rolled back.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::config::ReplicatorConfig;
use super::error::Result;
use super::function_sync::{FunctionAction, FunctionAddress, FunctionRegistry, FunctionReplicator};
use super::identity::{CredentialContext, IdentityBroker};
use super::route_sync::{PermissionRegistry, ReplicationOutcome, RouteReplicator, RoutingService};

/// What to replicate and where
#[derive(Debug, Clone)]
pub struct ReplicationRequest {
    pub source_function: FunctionAddress,
    pub source_role_arn: String,
    pub destination_region: String,
    /// Defaults to the source function's role rebased into the destination account
    pub execution_role_arn: Option<String>,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub source_function: FunctionAddress,
    pub destination_function: FunctionAddress,
    /// `None` when function replication was skipped
    pub function_action: Option<FunctionAction>,
    pub routing: ReplicationOutcome,
}

impl PipelineReport {
    pub fn display(&self) -> String {
        let function = match self.function_action {
            Some(FunctionAction::Created) => "created",
            Some(FunctionAction::Updated) => "updated",
            None => "skipped",
        };
        format!(
            "Function {} -> {} ({})\n{}",
            self.source_function,
            self.destination_function,
            function,
            self.routing.display()
        )
    }
}

pub struct ReplicationPipeline {
    functions: Arc<dyn FunctionRegistry>,
    routing: Arc<dyn RoutingService>,
    permissions: Arc<dyn PermissionRegistry>,
    config: ReplicatorConfig,
}

impl ReplicationPipeline {
    pub fn new(
        functions: Arc<dyn FunctionRegistry>,
        routing: Arc<dyn RoutingService>,
        permissions: Arc<dyn PermissionRegistry>,
        config: ReplicatorConfig,
    ) -> Self {
        Self {
            functions,
            routing,
            permissions,
            config,
        }
    }

    /// Resolve both credential contexts through `broker`, then run
    pub async fn run_with_broker(
        &self,
        broker: &IdentityBroker,
        request: &ReplicationRequest,
    ) -> Result<PipelineReport> {
        let source_ctx = broker
            .assume_source(&request.source_role_arn, &request.source_function.region)
            .await?;
        let destination_ctx = broker
            .destination_context(&request.destination_region)
            .await?;

        self.run(&source_ctx, &destination_ctx, request).await
    }

    pub async fn run(
        &self,
        source_ctx: &CredentialContext,
        destination_ctx: &CredentialContext,
        request: &ReplicationRequest,
    ) -> Result<PipelineReport> {
        let source = &request.source_function;

        let (destination, function_action) = if self.config.skip_function {
            info!(function = %source.name, "Skipping function replication");
            (
                source.relocated(destination_ctx.region(), destination_ctx.account_id()),
                None,
            )
        } else {
            let (address, action) = FunctionReplicator::new(self.functions.clone(), self.config.poll.clone())
                .replicate(
                    source_ctx,
                    destination_ctx,
                    source,
                    request.execution_role_arn.as_deref(),
                )
                .await?;
            (address, Some(action))
        };

        let routing = RouteReplicator::new(
            self.routing.clone(),
            self.permissions.clone(),
            self.config.clone(),
        )
        .run(source_ctx, destination_ctx, source, &destination)
        .await?;

        Ok(PipelineReport {
            source_function: source.clone(),
            destination_function: destination,
            function_action,
            routing,
        })
    }
}
