//! fn-replicate - Standalone Binary
//!
//! Copies a function and the REST API that triggers it from a source
//! account (reached by assuming a role) into the ambient account.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lambda_replicator::agents::config::{PollConfig, SessionConfig};
use lambda_replicator::agents::identity::{role_account, IdentityBroker};
use lambda_replicator::function_sync::FunctionAddress;
use lambda_replicator::{
    ApiGatewayTool, LambdaTool, PermissionStrategy, ReplicationError, ReplicationPipeline,
    ReplicationRequest, ReplicatorConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// New statement id per grant
    Accumulate,
    /// Statement id derived from API, verb and path
    Reconcile,
}

impl From<StrategyArg> for PermissionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Accumulate => PermissionStrategy::Accumulate,
            StrategyArg::Reconcile => PermissionStrategy::ReconcileByDerivedId,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Replicate a function and its API Gateway trigger into another account
#[derive(Parser, Debug)]
#[command(name = "fn-replicate", version, about)]
struct Args {
    /// ARN of the function to copy
    #[arg(long, env = "SOURCE_FUNCTION_ARN")]
    source_function_arn: String,

    /// Role in the source account assumed for all source reads
    #[arg(long, env = "SOURCE_ROLE_ARN")]
    source_role_arn: String,

    /// Destination region (defaults to the source function's region)
    #[arg(long, env = "AWS_REGION")]
    destination_region: Option<String>,

    /// Execution role for the destination function
    #[arg(long, env = "EXECUTION_ROLE_ARN")]
    execution_role_arn: Option<String>,

    /// Only replicate the API; the destination function must already exist
    #[arg(long, default_value = "false")]
    skip_function: bool,

    /// Skip methods already integrated with the destination function
    #[arg(long, default_value = "false")]
    resume: bool,

    #[arg(long, value_enum, default_value = "accumulate")]
    permission_strategy: StrategyArg,

    /// Seconds between function readiness checks
    #[arg(long, default_value = "5")]
    poll_interval_secs: u64,

    #[arg(long, default_value = "60")]
    max_poll_attempts: u32,

    #[arg(long, default_value = "fn-replicator", env = "SESSION_NAME")]
    session_name: String,

    #[arg(long, default_value = "3600")]
    session_duration_secs: i32,

    /// Do not ask for confirmation
    #[arg(long, short = 'y', default_value = "false")]
    yes: bool,

    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Emit logs as JSON
    #[arg(long, default_value = "false", env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn config(&self) -> ReplicatorConfig {
        ReplicatorConfig {
            permission_strategy: self.permission_strategy.into(),
            resume: self.resume,
            skip_function: self.skip_function,
            poll: PollConfig {
                interval_secs: self.poll_interval_secs,
                max_attempts: self.max_poll_attempts,
            },
            session: SessionConfig {
                name: self.session_name.clone(),
                duration_secs: self.session_duration_secs,
            },
        }
    }

    fn request(&self) -> Result<ReplicationRequest> {
        let source_function: FunctionAddress = self
            .source_function_arn
            .parse()
            .context("Invalid --source-function-arn")?;
        role_account(&self.source_role_arn).context("Invalid --source-role-arn")?;

        let destination_region = self
            .destination_region
            .clone()
            .unwrap_or_else(|| source_function.region.clone());

        Ok(ReplicationRequest {
            source_function,
            source_role_arn: self.source_role_arn.clone(),
            destination_region,
            execution_role_arn: self.execution_role_arn.clone(),
        })
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Ask the operator on stderr/stdin; anything but y/yes declines
fn confirm(request: &ReplicationRequest, config: &ReplicatorConfig) -> Result<(), ReplicationError> {
    confirm_with(
        &mut std::io::stderr(),
        &mut std::io::stdin().lock(),
        request,
        config,
    )
}

/// An operator who cannot be asked, or whose answer cannot be read, declines
fn confirm_with(
    prompt: &mut impl Write,
    input: &mut impl BufRead,
    request: &ReplicationRequest,
    config: &ReplicatorConfig,
) -> Result<(), ReplicationError> {
    let mut ask = || -> std::io::Result<String> {
        writeln!(
            prompt,
            "Replicate {} into region {}{} (permissions: {})?",
            request.source_function,
            request.destination_region,
            if config.skip_function { ", API only" } else { "" },
            config.permission_strategy,
        )?;
        write!(prompt, "Proceed? [y/N] ")?;
        prompt.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        Ok(answer)
    };

    let answer = ask().map_err(|e| {
        warn!(error = %e, "Confirmation prompt failed");
        ReplicationError::UserAbort
    })?;

    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => Err(ReplicationError::UserAbort),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let request = args.request()?;
    let config = args.config();

    info!(
        function = %request.source_function,
        destination_region = %request.destination_region,
        strategy = %config.permission_strategy,
        resume = config.resume,
        "Starting function replication"
    );

    if !args.yes {
        if let Err(e) = confirm(&request, &config) {
            info!("{}", e);
            return Ok(());
        }
    }

    let broker = IdentityBroker::from_env(config.session.clone()).await;
    let lambda = Arc::new(LambdaTool::new(config.poll.clone()).context("Failed to build Lambda tool")?);
    let pipeline = ReplicationPipeline::new(
        lambda.clone(),
        Arc::new(ApiGatewayTool::new()),
        lambda,
        config,
    );

    let report = match pipeline.run_with_broker(&broker, &request).await {
        Ok(report) => report,
        Err(e) if e.is_user_abort() => {
            info!("{}", e);
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "Replication failed");
            return Err(e).context("Replication failed");
        }
    };

    match args.output {
        OutputFormat::Text => println!("{}", report.display()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to render report")?
        ),
    }

    Ok(())
}
