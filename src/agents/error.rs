//! Replication error taxonomy
//!
//! Every remote failure is fatal: nothing is retried and nothing is rolled
//! back. Remote messages are carried verbatim so operators see the raw
//! service text.

use thiserror::Error;

/// Result type for replication operations
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur while replicating a function and its routing tree
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// A container, node, function or role could not be resolved
    #[error("{kind} not found: {name}")]
    Lookup { kind: &'static str, name: String },

    /// Role assumption or caller identity resolution was rejected
    #[error("Credential failure: {0}")]
    Credential(String),

    /// A create/update/integration/permission/deployment call was rejected
    #[error("{operation} failed: {message}")]
    RemoteOperation {
        operation: &'static str,
        message: String,
    },

    /// The fetched resource tree violates the single-root parent invariant
    #[error("Malformed resource tree: {0}")]
    MalformedTree(String),

    /// A function or role address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The operator declined confirmation
    #[error("Replication aborted by operator")]
    UserAbort,
}

impl ReplicationError {
    pub fn lookup(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Lookup {
            kind,
            name: name.into(),
        }
    }

    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        Self::RemoteOperation {
            operation,
            message: message.into(),
        }
    }

    /// Lookup failures are "create" triggers everywhere except the source side
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }

    /// Whether the run ended cleanly rather than failing
    pub fn is_user_abort(&self) -> bool {
        matches!(self, Self::UserAbort)
    }
}
