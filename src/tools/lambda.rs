//! Lambda Tool
//!
//! Function configuration, code packages and resource policy grants.
//! Code packages are downloaded from the pre-signed location returned by
//! GetFunction and uploaded inline on create/update.

use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, LastUpdateStatus, Runtime, State};
use aws_sdk_lambda::Client;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::{debug, info};

use crate::agents::config::PollConfig;
use crate::agents::error::{ReplicationError, Result};
use crate::agents::function_sync::{FunctionRegistry, FunctionSnapshot};
use crate::agents::identity::CredentialContext;
use crate::agents::route_sync::{GrantOutcome, InvocationPermission, PermissionRegistry};

/// Lambda client wrapper used for both function copies and invoke grants
#[derive(Debug, Clone)]
pub struct LambdaTool {
    http_client: HttpClient,
    /// Used between the code and configuration halves of an update
    poll: PollConfig,
}

/// Where a function sits in its provisioning lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Ready,
    Pending,
    Failed,
}

fn readiness(state: Option<&State>, last_update: Option<&LastUpdateStatus>) -> Readiness {
    match (state, last_update) {
        (Some(State::Failed), _) | (_, Some(LastUpdateStatus::Failed)) => Readiness::Failed,
        (Some(State::Pending), _) | (_, Some(LastUpdateStatus::InProgress)) => Readiness::Pending,
        _ => Readiness::Ready,
    }
}

impl LambdaTool {
    pub fn new(poll: PollConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ReplicationError::remote("HttpClient", e.to_string()))?;

        Ok(Self { http_client, poll })
    }

    fn client(ctx: &CredentialContext) -> Client {
        Client::new(ctx.sdk_config())
    }

    async fn download_code(&self, location: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(location)
            .send()
            .await
            .map_err(|e| ReplicationError::remote("DownloadCode", e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReplicationError::remote(
                "DownloadCode",
                format!("code location returned {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReplicationError::remote("DownloadCode", e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn environment(snapshot: &FunctionSnapshot) -> Environment {
        Environment::builder()
            .set_variables(Some(snapshot.environment.clone()))
            .build()
    }
}

#[async_trait]
impl FunctionRegistry for LambdaTool {
    async fn fetch(&self, ctx: &CredentialContext, name: &str) -> Result<FunctionSnapshot> {
        let output = Self::client(ctx)
            .get_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_resource_not_found_exception())
                    .unwrap_or(false);
                if missing {
                    ReplicationError::lookup("function", name)
                } else {
                    ReplicationError::remote("GetFunction", DisplayErrorContext(&e).to_string())
                }
            })?;

        let config = output
            .configuration()
            .ok_or_else(|| ReplicationError::remote("GetFunction", "response carried no configuration"))?;
        let location = output
            .code()
            .and_then(|c| c.location())
            .ok_or_else(|| ReplicationError::remote("GetFunction", "response carried no code location"))?;

        let code = self.download_code(location).await?;

        Ok(FunctionSnapshot {
            name: name.to_string(),
            runtime: config.runtime().map(|r| r.as_str().to_string()),
            handler: config.handler().map(str::to_string),
            role: config.role().map(str::to_string),
            timeout: config.timeout(),
            memory_size: config.memory_size(),
            description: config.description().map(str::to_string),
            environment: config
                .environment()
                .and_then(|env| env.variables())
                .cloned()
                .unwrap_or_default(),
            code,
        })
    }

    async fn exists(&self, ctx: &CredentialContext, name: &str) -> Result<bool> {
        match Self::client(ctx)
            .get_function_configuration()
            .function_name(name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_resource_not_found_exception())
                    .unwrap_or(false) =>
            {
                Ok(false)
            }
            Err(e) => Err(ReplicationError::remote(
                "GetFunctionConfiguration",
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    async fn create(
        &self,
        ctx: &CredentialContext,
        snapshot: &FunctionSnapshot,
        role_arn: &str,
    ) -> Result<()> {
        Self::client(ctx)
            .create_function()
            .function_name(&snapshot.name)
            .set_runtime(snapshot.runtime.as_deref().map(Runtime::from))
            .set_handler(snapshot.handler.clone())
            .role(role_arn)
            .set_timeout(snapshot.timeout)
            .set_memory_size(snapshot.memory_size)
            .set_description(snapshot.description.clone())
            .environment(Self::environment(snapshot))
            .code(
                FunctionCode::builder()
                    .zip_file(Blob::new(snapshot.code.clone()))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| ReplicationError::remote("CreateFunction", DisplayErrorContext(&e).to_string()))?;

        info!(function = %snapshot.name, account = %ctx.account_id(), "Created function");
        Ok(())
    }

    async fn update(
        &self,
        ctx: &CredentialContext,
        snapshot: &FunctionSnapshot,
        role_arn: &str,
    ) -> Result<()> {
        let client = Self::client(ctx);

        client
            .update_function_code()
            .function_name(&snapshot.name)
            .zip_file(Blob::new(snapshot.code.clone()))
            .send()
            .await
            .map_err(|e| {
                ReplicationError::remote("UpdateFunctionCode", DisplayErrorContext(&e).to_string())
            })?;

        // Configuration updates are rejected while the code update is in progress
        self.wait_until_ready(ctx, &snapshot.name, &self.poll).await?;

        client
            .update_function_configuration()
            .function_name(&snapshot.name)
            .set_runtime(snapshot.runtime.as_deref().map(Runtime::from))
            .set_handler(snapshot.handler.clone())
            .role(role_arn)
            .set_timeout(snapshot.timeout)
            .set_memory_size(snapshot.memory_size)
            .set_description(snapshot.description.clone())
            .environment(Self::environment(snapshot))
            .send()
            .await
            .map_err(|e| {
                ReplicationError::remote(
                    "UpdateFunctionConfiguration",
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        info!(function = %snapshot.name, account = %ctx.account_id(), "Updated function");
        Ok(())
    }

    async fn wait_until_ready(
        &self,
        ctx: &CredentialContext,
        name: &str,
        poll: &PollConfig,
    ) -> Result<()> {
        let client = Self::client(ctx);

        for attempt in 1..=poll.max_attempts {
            let config = client
                .get_function_configuration()
                .function_name(name)
                .send()
                .await
                .map_err(|e| {
                    ReplicationError::remote(
                        "GetFunctionConfiguration",
                        DisplayErrorContext(&e).to_string(),
                    )
                })?;

            match readiness(config.state(), config.last_update_status()) {
                Readiness::Ready => return Ok(()),
                Readiness::Failed => {
                    return Err(ReplicationError::remote(
                        "FunctionProvisioning",
                        config
                            .state_reason()
                            .or(config.last_update_status_reason())
                            .unwrap_or("function entered a failed state")
                            .to_string(),
                    ))
                }
                Readiness::Pending => {
                    debug!(function = %name, attempt, "Function still provisioning");
                    tokio::time::sleep(Duration::from_secs(poll.interval_secs)).await;
                }
            }
        }

        Err(ReplicationError::remote(
            "FunctionProvisioning",
            format!("{} not ready after {} checks", name, poll.max_attempts),
        ))
    }
}

#[async_trait]
impl PermissionRegistry for LambdaTool {
    async fn add_permission(
        &self,
        ctx: &CredentialContext,
        grant: &InvocationPermission,
    ) -> Result<GrantOutcome> {
        let result = Self::client(ctx)
            .add_permission()
            .function_name(&grant.function_name)
            .statement_id(&grant.statement_id)
            .principal(&grant.principal)
            .action(&grant.action)
            .source_arn(&grant.source_arn)
            .send()
            .await;

        match result {
            Ok(_) => Ok(GrantOutcome::Granted),
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_resource_conflict_exception())
                    .unwrap_or(false) =>
            {
                debug!(statement = %grant.statement_id, "AddPermission conflict");
                Ok(GrantOutcome::Conflict(DisplayErrorContext(&e).to_string()))
            }
            Err(e) => Err(ReplicationError::remote(
                "AddPermission",
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_from_lifecycle_fields() {
        assert_eq!(readiness(Some(&State::Active), None), Readiness::Ready);
        assert_eq!(
            readiness(Some(&State::Active), Some(&LastUpdateStatus::Successful)),
            Readiness::Ready
        );
        assert_eq!(readiness(Some(&State::Pending), None), Readiness::Pending);
        assert_eq!(
            readiness(Some(&State::Active), Some(&LastUpdateStatus::InProgress)),
            Readiness::Pending
        );
        assert_eq!(readiness(Some(&State::Failed), None), Readiness::Failed);
        assert_eq!(
            readiness(Some(&State::Active), Some(&LastUpdateStatus::Failed)),
            Readiness::Failed
        );
        assert_eq!(readiness(None, None), Readiness::Ready);
    }

    #[test]
    fn test_environment_carries_variables() {
        let mut snapshot = FunctionSnapshot::default();
        snapshot
            .environment
            .insert("TABLE".to_string(), "orders".to_string());
        let env = LambdaTool::environment(&snapshot);
        assert_eq!(
            env.variables().and_then(|v| v.get("TABLE")).map(String::as_str),
            Some("orders")
        );
    }
}
