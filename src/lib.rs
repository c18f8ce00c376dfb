//! Lambda Replicator Library
//!
//! Cross-account replication of a function and the API Gateway routing tree
//! that triggers it.

pub mod agents;
pub mod tools;

pub use agents::config::{PermissionStrategy, ReplicatorConfig};
pub use agents::function_sync;
pub use agents::route_sync;
pub use agents::{ReplicationError, ReplicationPipeline, ReplicationRequest};
pub use tools::{ApiGatewayTool, LambdaTool};
