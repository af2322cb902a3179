use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use mongo_provision::{Provisioner, ProvisionRequest};
use provision_db::MongoDeployment;
use provision_kernel::settings::{LogFormat, Settings};
use provision_kernel::AppCredentials;

/// Ensure the application MongoDB user from APP_MONGO_DB, APP_MONGO_USER and
/// APP_MONGO_PASSWORD exists with readWrite access to its database.
#[derive(Debug, Parser)]
#[command(name = "mongo-provision", version, about)]
struct Cli {
    /// Admin connection string; overrides PROVISION_MONGO_URI.
    #[arg(long, value_name = "URI")]
    uri: Option<String>,

    /// Status line format: pretty or json.
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand, Default)]
enum Command {
    /// Create the user, or confirm it already exists (default).
    #[default]
    Ensure,
    /// Validate configuration and show the planned request without connecting.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load provisioning settings")?;
    if let Some(uri) = cli.uri {
        settings.mongo.uri = SecretString::from(uri);
    }
    if let Some(format) = cli.log_format {
        settings.telemetry.format = format;
    }

    provision_telemetry::init(&settings.telemetry)?;

    let credentials = AppCredentials::from_env().inspect_err(|err| {
        tracing::error!("{}", err);
    })?;
    let request = ProvisionRequest::from(credentials);

    match cli.command.unwrap_or_default() {
        Command::Check => check(&settings, &request),
        Command::Ensure => ensure(&settings, &request).await,
    }
}

fn check(settings: &Settings, request: &ProvisionRequest) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        user = request.user_name(),
        database = request.database_name(),
        roles = ?request.roles(),
        "configuration valid; would ensure user '{}' with readWrite access to database '{}'",
        request.user_name(),
        request.database_name()
    );
    Ok(())
}

async fn ensure(settings: &Settings, request: &ProvisionRequest) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        user = request.user_name(),
        database = request.database_name(),
        "mongo-provision starting"
    );

    let deployment = MongoDeployment::connect(&settings.mongo).await?;
    let outcome = Provisioner::new(deployment).ensure_user(request).await;

    // Anomalies are reported, not escalated to the exit code.
    tracing::debug!(success = outcome.is_success(), "mongo-provision finished");
    Ok(())
}
