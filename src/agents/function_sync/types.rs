//! Function Replication Types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::agents::error::{ReplicationError, Result};

/// Region, account and name of a function
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionAddress {
    pub region: String,
    pub account_id: String,
    pub name: String,
}

impl FunctionAddress {
    pub fn new(
        region: impl Into<String>,
        account_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            name: name.into(),
        }
    }

    /// Unqualified function ARN
    pub fn arn(&self) -> String {
        format!(
            "arn:aws:lambda:{}:{}:function:{}",
            self.region, self.account_id, self.name
        )
    }

    /// Target URI for a proxy integration invoking this function
    pub fn integration_uri(&self) -> String {
        format!(
            "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
            self.region,
            self.arn()
        )
    }

    /// Same function name in another region and account
    pub fn relocated(&self, region: &str, account_id: &str) -> Self {
        Self::new(region, account_id, self.name.clone())
    }
}

impl std::fmt::Display for FunctionAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.arn())
    }
}

impl FromStr for FunctionAddress {
    type Err = ReplicationError;

    /// Parses `arn:aws:lambda:<region>:<account>:function:<name>[:qualifier]`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["arn", _, "lambda", region, account, "function", name, rest @ ..]
                if !region.is_empty()
                    && !account.is_empty()
                    && !name.is_empty()
                    && rest.len() <= 1 =>
            {
                Ok(Self::new(*region, *account, *name))
            }
            _ => Err(ReplicationError::InvalidAddress(format!(
                "not a function ARN: {}",
                s
            ))),
        }
    }
}

/// Configuration and code of a function, as read from the source account
#[derive(Debug, Clone, Default)]
pub struct FunctionSnapshot {
    pub name: String,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub role: Option<String>,
    pub timeout: Option<i32>,
    pub memory_size: Option<i32>,
    pub description: Option<String>,
    pub environment: HashMap<String, String>,
    /// Zipped deployment package
    pub code: Vec<u8>,
}

/// Whether the destination function was created or updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionAction {
    Created,
    Updated,
}
