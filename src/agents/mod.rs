//! Agent modules for the function replicator
//!
//! - `function_sync`: copies a function's configuration and code package
//! - `route_sync`: replicates the REST API fronting a function
//! - `pipeline`: sequences both under explicit credential contexts

pub mod config;
pub mod error;
pub mod function_sync;
pub mod identity;
pub mod pipeline;
pub mod route_sync;

pub use error::{ReplicationError, Result};
pub use identity::{AccountScope, CredentialContext, IdentityBroker};
pub use pipeline::{PipelineReport, ReplicationPipeline, ReplicationRequest};
