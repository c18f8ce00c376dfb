//! Function Replication Agent
//!
//! Copies a function's configuration and code package from the source
//! account and creates or updates the same-named function at the
//! destination, running under a caller-supplied execution role.

mod registry;
mod replicator;
mod types;

pub use registry::FunctionRegistry;
pub use replicator::FunctionReplicator;
pub use types::{FunctionAction, FunctionAddress, FunctionSnapshot};

#[cfg(test)]
pub(crate) use replicator::tests::{orders_snapshot, InMemoryFunctions};
