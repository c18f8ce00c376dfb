//! Method Replicator
//!
//! For every (node, verb) pair of the source tree: register the method,
//! attach the proxy integration to the destination function, and grant the
//! routing service permission to invoke it.

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use super::providers::{PermissionRegistry, RoutingService};
use super::reconciler::Reconciliation;
use super::types::{
    GrantOutcome, HttpVerb, InvocationPermission, MethodBinding, MethodState, ResourceTree,
};
use crate::agents::config::{
    PermissionStrategy, AUTHORIZATION_NONE, INVOKE_ACTION, ROUTING_PRINCIPAL,
};
use crate::agents::error::{ReplicationError, Result};
use crate::agents::function_sync::FunctionAddress;
use crate::agents::identity::CredentialContext;

/// Counts of what the replicator did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodReport {
    pub methods_created: usize,
    pub integrations_put: usize,
    pub permissions_granted: usize,
    pub permissions_reused: usize,
    /// Pairs whose integration was already in place (resume mode only)
    pub skipped: usize,
}

/// Statement id for a grant under the configured strategy
pub fn statement_id(
    strategy: PermissionStrategy,
    container_id: &str,
    verb: HttpVerb,
    path: &str,
) -> String {
    match strategy {
        PermissionStrategy::Accumulate => format!("apigw-{}", Uuid::new_v4().simple()),
        PermissionStrategy::ReconcileByDerivedId => {
            let digest = Sha256::digest(format!("{}|{}|{}", container_id, verb, path));
            format!("apigw-{}", &hex::encode(digest)[..24])
        }
    }
}

/// Execute-api source ARN scoping a grant to one container and verb
pub fn invoke_source_arn(ctx: &CredentialContext, container_id: &str, verb: HttpVerb) -> String {
    format!(
        "arn:aws:execute-api:{}:{}:{}/*/{}/*",
        ctx.region(),
        ctx.account_id(),
        container_id,
        verb.arn_segment()
    )
}

pub struct MethodReplicator<'a> {
    routing: &'a dyn RoutingService,
    permissions: &'a dyn PermissionRegistry,
    strategy: PermissionStrategy,
    resume: bool,
}

impl<'a> MethodReplicator<'a> {
    pub fn new(
        routing: &'a dyn RoutingService,
        permissions: &'a dyn PermissionRegistry,
        strategy: PermissionStrategy,
        resume: bool,
    ) -> Self {
        Self {
            routing,
            permissions,
            strategy,
            resume,
        }
    }

    /// Replicate every bound verb onto the reconciled destination nodes.
    ///
    /// `destination` is the tree as fetched before reconciliation; nodes
    /// created since then carry no methods. The first failure aborts.
    pub async fn replicate(
        &self,
        ctx: &CredentialContext,
        source: &ResourceTree,
        destination: &ResourceTree,
        reconciliation: &Reconciliation,
        target: &FunctionAddress,
    ) -> Result<MethodReport> {
        let integration_uri = target.integration_uri();
        let mut report = MethodReport::default();

        for node in source.traversal_order()? {
            if node.methods.is_empty() {
                continue;
            }

            let resource_id = reconciliation.destination_of(&node.id)?;
            let existing = destination
                .node(resource_id)
                .map(|n| &n.methods);

            for verb in node.methods.keys().copied() {
                let current: Option<&MethodState> = existing.and_then(|m| m.get(&verb));

                let integrated = current.and_then(|m| m.integration_uri.as_deref())
                    == Some(integration_uri.as_str());

                let binding = MethodBinding {
                    resource_id: resource_id.to_string(),
                    path: node.path.clone(),
                    verb,
                    authorization: AUTHORIZATION_NONE.to_string(),
                    integration_uri: integration_uri.clone(),
                };

                // A resumed pair still gets its grant: the previous run may
                // have stopped between the integration and the permission.
                if self.resume && integrated {
                    debug!(path = %node.path, verb = %verb, "Method already integrated, skipping");
                    report.skipped += 1;
                } else {
                    if current.is_none() {
                        self.routing
                            .put_method(ctx, &destination.container_id, &binding)
                            .await?;
                        report.methods_created += 1;
                        info!(path = %node.path, verb = %verb, "Created method");
                    } else {
                        debug!(path = %node.path, verb = %verb, "Method exists, keeping it");
                    }

                    self.routing
                        .put_integration(ctx, &destination.container_id, &binding)
                        .await?;
                    report.integrations_put += 1;
                }

                let grant = InvocationPermission {
                    function_name: target.name.clone(),
                    statement_id: statement_id(
                        self.strategy,
                        &destination.container_id,
                        verb,
                        &node.path,
                    ),
                    principal: ROUTING_PRINCIPAL.to_string(),
                    action: INVOKE_ACTION.to_string(),
                    source_arn: invoke_source_arn(ctx, &destination.container_id, verb),
                };

                match self.permissions.add_permission(ctx, &grant).await? {
                    GrantOutcome::Granted => {
                        report.permissions_granted += 1;
                        debug!(statement = %grant.statement_id, "Granted invoke permission");
                    }
                    GrantOutcome::Conflict(_)
                        if self.strategy == PermissionStrategy::ReconcileByDerivedId =>
                    {
                        report.permissions_reused += 1;
                        debug!(statement = %grant.statement_id, "Invoke permission already present");
                    }
                    // Fresh ids never collide, so the function itself refused
                    GrantOutcome::Conflict(message) => {
                        return Err(ReplicationError::remote("AddPermission", message));
                    }
                }
            }
        }

        info!(
            methods = report.methods_created,
            integrations = report.integrations_put,
            grants = report.permissions_granted,
            "Replicated methods"
        );

        Ok(report)
    }
}
