//! Replicator Configuration
//!
//! Run-wide settings built from CLI arguments and environment variables.

use serde::{Deserialize, Serialize};

/// Stage every run deploys to
pub const DEPLOYMENT_STAGE: &str = "prod";

/// Principal granted invoke rights on the destination function
pub const ROUTING_PRINCIPAL: &str = "apigateway.amazonaws.com";

/// Action granted to the routing service
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";

/// Proxy integrations always reach the backend with POST
pub const BACKEND_INVOCATION_VERB: &str = "POST";

/// Authorization mode applied to every replicated method
pub const AUTHORIZATION_NONE: &str = "NONE";

/// How invocation permission statement ids are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStrategy {
    /// Fresh id per grant; repeated runs add redundant statements
    #[default]
    Accumulate,
    /// Id derived from (container, verb, path); existing statements are reused
    ReconcileByDerivedId,
}

impl std::fmt::Display for PermissionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStrategy::Accumulate => write!(f, "accumulate"),
            PermissionStrategy::ReconcileByDerivedId => write!(f, "reconcile"),
        }
    }
}

/// Polling for asynchronous function provisioning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between readiness checks
    pub interval_secs: u64,
    /// Checks before giving up
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_attempts: 60,
        }
    }
}

/// STS session parameters for the source role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub name: String,
    pub duration_secs: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "fn-replicator".to_string(),
            duration_secs: 3600,
        }
    }
}

/// Configuration for a replication run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    pub permission_strategy: PermissionStrategy,
    /// No method or integration calls for (node, verb) pairs already
    /// integrated with the same target; their grant is still issued
    pub resume: bool,
    /// Only replicate routing; the destination function must already exist
    pub skip_function: bool,
    pub poll: PollConfig,
    pub session: SessionConfig,
}
