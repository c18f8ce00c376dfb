//! Function Replicator
//!
//! Reads a function under the source context and creates or updates its
//! copy under the destination context.

use std::sync::Arc;
use tracing::info;

use super::registry::FunctionRegistry;
use super::types::{FunctionAction, FunctionAddress};
use crate::agents::config::PollConfig;
use crate::agents::error::Result;
use crate::agents::error::ReplicationError;
use crate::agents::identity::{rebase_role, CredentialContext};

pub struct FunctionReplicator {
    registry: Arc<dyn FunctionRegistry>,
    poll: PollConfig,
}

impl FunctionReplicator {
    pub fn new(registry: Arc<dyn FunctionRegistry>, poll: PollConfig) -> Self {
        Self { registry, poll }
    }

    /// Copy `source` into the destination account, returning its new address.
    ///
    /// Without an explicit `execution_role` the source function's role is
    /// rebased into the destination account. The role itself must exist there.
    pub async fn replicate(
        &self,
        source_ctx: &CredentialContext,
        destination_ctx: &CredentialContext,
        source: &FunctionAddress,
        execution_role: Option<&str>,
    ) -> Result<(FunctionAddress, FunctionAction)> {
        source_ctx.ensure_fresh()?;
        let snapshot = self.registry.fetch(source_ctx, &source.name).await?;
        info!(
            function = %source.name,
            runtime = ?snapshot.runtime,
            code_bytes = snapshot.code.len(),
            "Fetched source function"
        );

        let execution_role = match execution_role {
            Some(role) => role.to_string(),
            None => {
                let source_role = snapshot.role.as_deref().ok_or_else(|| {
                    ReplicationError::lookup("execution role", source.arn())
                })?;
                rebase_role(source_role, destination_ctx.account_id())?
            }
        };
        let execution_role = execution_role.as_str();

        let action = if self.registry.exists(destination_ctx, &snapshot.name).await? {
            self.registry
                .update(destination_ctx, &snapshot, execution_role)
                .await?;
            FunctionAction::Updated
        } else {
            self.registry
                .create(destination_ctx, &snapshot, execution_role)
                .await?;
            FunctionAction::Created
        };

        self.registry
            .wait_until_ready(destination_ctx, &snapshot.name, &self.poll)
            .await?;

        let destination =
            source.relocated(destination_ctx.region(), destination_ctx.account_id());
        info!(function = %destination, action = ?action, "Destination function ready");

        Ok((destination, action))
    }
}
