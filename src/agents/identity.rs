//! Cross-Account Credential Contexts
//!
//! Source reads run under temporary credentials obtained through STS
//! AssumeRole; destination writes run under the ambient credentials.
//! Each scope is an explicit [`CredentialContext`] handed to every remote
//! call, so no process-wide credential state exists to leak between scopes.

use aws_config::{Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use super::config::SessionConfig;
use super::error::{ReplicationError, Result};

/// Which side of the replication a context belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountScope {
    Source,
    Destination,
}

impl std::fmt::Display for AccountScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountScope::Source => write!(f, "source"),
            AccountScope::Destination => write!(f, "destination"),
        }
    }
}

/// Credentials and location for one account scope
#[derive(Debug, Clone)]
pub struct CredentialContext {
    scope: AccountScope,
    account_id: String,
    region: String,
    sdk_config: SdkConfig,
    expires_at: Option<DateTime<Utc>>,
}

impl CredentialContext {
    pub fn new(
        scope: AccountScope,
        account_id: impl Into<String>,
        region: impl Into<String>,
        sdk_config: SdkConfig,
    ) -> Self {
        Self {
            scope,
            account_id: account_id.into(),
            region: region.into(),
            sdk_config,
            expires_at: None,
        }
    }

    /// Context without any credentials provider, used where no remote call is made
    #[cfg(test)]
    pub(crate) fn unauthenticated(
        scope: AccountScope,
        account_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let region = region.into();
        let sdk_config = SdkConfig::builder()
            .region(Region::new(region.clone()))
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        Self::new(scope, account_id, region, sdk_config)
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn scope(&self) -> AccountScope {
        self.scope
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }

    /// Ambient credentials never expire from this process' point of view
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() >= at).unwrap_or(false)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Fail with `Credential` once temporary credentials have lapsed
    pub fn ensure_fresh(&self) -> Result<()> {
        if self.is_expired() {
            return Err(ReplicationError::Credential(format!(
                "{} credentials for account {} have expired",
                self.scope, self.account_id
            )));
        }
        if let Some(remaining) = self.time_until_expiry() {
            debug!(scope = %self.scope, remaining_secs = remaining.as_secs(), "Credentials valid");
        }
        Ok(())
    }
}

/// Issues credential contexts for both sides of a replication run
pub struct IdentityBroker {
    ambient: SdkConfig,
    session: SessionConfig,
}

impl IdentityBroker {
    pub fn new(ambient: SdkConfig, session: SessionConfig) -> Self {
        Self { ambient, session }
    }

    /// Load ambient credentials from the default provider chain
    pub async fn from_env(session: SessionConfig) -> Self {
        let ambient = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(ambient, session)
    }

    /// Destination context using the ambient credentials
    pub async fn destination_context(&self, region: &str) -> Result<CredentialContext> {
        let sdk_config = self
            .ambient
            .to_builder()
            .region(Region::new(region.to_string()))
            .build();

        let identity = aws_sdk_sts::Client::new(&sdk_config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| {
                ReplicationError::Credential(format!(
                    "GetCallerIdentity: {}",
                    aws_sdk_sts::error::DisplayErrorContext(&e)
                ))
            })?;

        let account_id = identity
            .account()
            .ok_or_else(|| {
                ReplicationError::Credential("GetCallerIdentity returned no account".to_string())
            })?
            .to_string();

        info!(account = %account_id, region = %region, "Resolved destination identity");

        Ok(CredentialContext::new(
            AccountScope::Destination,
            account_id,
            region,
            sdk_config,
        ))
    }

    /// Source context from STS AssumeRole on the given role
    pub async fn assume_source(&self, role_arn: &str, region: &str) -> Result<CredentialContext> {
        let account_id = role_account(role_arn)?;

        let output = aws_sdk_sts::Client::new(&self.ambient)
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(&self.session.name)
            .duration_seconds(self.session.duration_secs)
            .send()
            .await
            .map_err(|e| {
                ReplicationError::Credential(format!(
                    "AssumeRole {}: {}",
                    role_arn,
                    aws_sdk_sts::error::DisplayErrorContext(&e)
                ))
            })?;

        let creds = output.credentials().ok_or_else(|| {
            ReplicationError::Credential(format!("AssumeRole {} returned no credentials", role_arn))
        })?;

        let expiry = SystemTime::try_from(*creds.expiration()).ok();
        let provider = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            expiry,
            "sts-assume-role",
        );

        let sdk_config = self
            .ambient
            .to_builder()
            .region(Region::new(region.to_string()))
            .credentials_provider(SharedCredentialsProvider::new(provider))
            .build();

        info!(role = %role_arn, account = %account_id, "Assumed source role");

        let mut ctx = CredentialContext::new(AccountScope::Source, account_id, region, sdk_config);
        if let Some(at) = expiry {
            ctx = ctx.with_expiry(DateTime::<Utc>::from(at));
        }
        Ok(ctx)
    }
}

/// Account id embedded in an IAM role ARN (`arn:aws:iam::<account>:role/<name>`)
pub fn role_account(role_arn: &str) -> Result<String> {
    let parts: Vec<&str> = role_arn.splitn(6, ':').collect();
    match parts.as_slice() {
        ["arn", _, "iam", "", account, resource]
            if !account.is_empty() && resource.starts_with("role/") =>
        {
            Ok(account.to_string())
        }
        _ => Err(ReplicationError::InvalidAddress(format!(
            "not an IAM role ARN: {}",
            role_arn
        ))),
    }
}

/// Role name from an IAM role ARN, dropping any path
pub fn role_name(role_arn: &str) -> Result<String> {
    role_account(role_arn)?;
    role_arn
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ReplicationError::InvalidAddress(format!("role ARN has no name: {}", role_arn)))
}

/// Same role path and name under another account
pub fn rebase_role(role_arn: &str, account_id: &str) -> Result<String> {
    role_account(role_arn)?;
    let parts: Vec<&str> = role_arn.splitn(6, ':').collect();
    match parts.as_slice() {
        ["arn", partition, "iam", "", _, resource] => {
            Ok(format!("arn:{}:iam::{}:{}", partition, account_id, resource))
        }
        _ => Err(ReplicationError::InvalidAddress(format!(
            "not an IAM role ARN: {}",
            role_arn
        ))),
    }
}
