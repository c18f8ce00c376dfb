//! API Trigger Replication Agent
//!
//! Replicates the REST API fronting a function into a destination account:
//! the resource tree is walked parent-first, reconciled against whatever
//! already exists at the destination, and every (path, verb) pair is bound
//! to the destination function through a proxy integration.
//!
//! ## Stages
//!
//! - **Fetcher**: full node set and bound verbs of a container
//! - **Reconciler**: (parent, path segment) matching, parent-first creation
//! - **Method Replicator**: method, integration and invoke permission per pair
//! - **Deployment Trigger**: one new `prod` deployment per run
//! - **Orchestrator**: source reads, then destination writes
//!
//! ## Guarantees
//!
//! - No retries and no rollback: the first failure ends the run
//! - Nodes are never mutated or deleted, only created when missing

mod deploy;
mod fetcher;
mod methods;
mod orchestrator;
mod providers;
mod reconciler;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use deploy::DeploymentTrigger;
pub use fetcher::TreeFetcher;
pub use methods::{invoke_source_arn, statement_id, MethodReplicator, MethodReport};
pub use orchestrator::RouteReplicator;
pub use providers::{PermissionRegistry, RoutingService};
pub use reconciler::{NodeIdentityMap, Reconciliation, TreeReconciler};
pub use types::{
    Deployment, GrantOutcome, HttpVerb, InvocationPermission, MethodBinding, MethodState,
    ReplicationOutcome, ResourceNode, ResourceTree, RouteSyncReport, RoutingContainer,
};
