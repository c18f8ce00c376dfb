//! Agent Tools
//!
//! AWS-backed implementations of the agents' remote collaborators. Every
//! call runs under the credential context handed in by the caller.

pub mod api_gateway;
pub mod lambda;

pub use api_gateway::ApiGatewayTool;
pub use lambda::LambdaTool;
