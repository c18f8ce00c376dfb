//! Function Registry Trait

use async_trait::async_trait;

use super::types::FunctionSnapshot;
use crate::agents::config::PollConfig;
use crate::agents::error::Result;
use crate::agents::identity::CredentialContext;

/// Function records: configuration, code package, create/update
#[async_trait]
pub trait FunctionRegistry: Send + Sync {
    /// Read configuration and download the code package
    async fn fetch(&self, ctx: &CredentialContext, name: &str) -> Result<FunctionSnapshot>;

    async fn exists(&self, ctx: &CredentialContext, name: &str) -> Result<bool>;

    async fn create(
        &self,
        ctx: &CredentialContext,
        snapshot: &FunctionSnapshot,
        role_arn: &str,
    ) -> Result<()>;

    /// Replace code, then configuration, of an existing function
    async fn update(
        &self,
        ctx: &CredentialContext,
        snapshot: &FunctionSnapshot,
        role_arn: &str,
    ) -> Result<()>;

    /// Block until provisioning settles or `poll` attempts are exhausted
    async fn wait_until_ready(
        &self,
        ctx: &CredentialContext,
        name: &str,
        poll: &PollConfig,
    ) -> Result<()>;
}
