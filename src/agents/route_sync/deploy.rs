//! Deployment Trigger

use tracing::info;

use super::providers::RoutingService;
use super::types::Deployment;
use crate::agents::config::DEPLOYMENT_STAGE;
use crate::agents::error::Result;
use crate::agents::identity::CredentialContext;

/// Publishes the reconciled destination tree to the `prod` stage.
///
/// Every call creates a new deployment, even when nothing changed.
pub struct DeploymentTrigger<'a> {
    routing: &'a dyn RoutingService,
}

impl<'a> DeploymentTrigger<'a> {
    pub fn new(routing: &'a dyn RoutingService) -> Self {
        Self { routing }
    }

    pub async fn deploy(&self, ctx: &CredentialContext, container_id: &str) -> Result<Deployment> {
        let deployment = self
            .routing
            .create_deployment(ctx, container_id, DEPLOYMENT_STAGE)
            .await?;

        info!(
            container = %container_id,
            deployment = %deployment.id,
            stage = %deployment.stage,
            "Deployed destination API"
        );

        Ok(deployment)
    }
}
