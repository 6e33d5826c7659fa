//! Deploy agent entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: flags via `clap`, secrets from the environment
//!    (`DEPLOY_SECRET`, `PERSONAL_ACCESS_TOKEN`). A missing secret is fatal.
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or text layer
//!    and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP
//!    exporter. All `tracing` spans and structured events emitted by every
//!    crate in the workspace flow through this subscriber.
//! 3. **Construct infrastructure**: `GitHubProvider`, `GitCli` and `Kubectl`,
//!    injected into the pipeline's `Orchestrator` or `DeploymentPrRequester`.
//! 4. **Run the subcommand**:
//!    - `agent`: serve the webhook listener and run the single deployment
//!      worker until interrupted.
//!    - `request`: raise one deployment pull request and exit.

mod agent;
mod args;
mod request;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;

use crate::args::{Cli, Command};

/// Webhook shared secret.
pub const SECRET_ENV: &str = "DEPLOY_SECRET";
/// Source-control personal access token.
pub const TOKEN_ENV: &str = "PERSONAL_ACCESS_TOKEN";

/// Reads a required, non-empty environment variable.
fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("environment variable {name} is not exported"))?;
    if value.is_empty() {
        anyhow::bail!("environment variable {name} is empty");
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.log_format).context("initialising telemetry")?;

    let result = match cli.command {
        Command::Agent(args) => agent::run(args).await,
        Command::Request(args) => request::run(args).await,
    };

    if let Err(err) = &result {
        tracing::error!("exiting with error: {err:#}");
    }
    telemetry.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_environment_variable_is_an_error() {
        let err = required_env("DEPLOY_TEST_SURELY_UNSET_VARIABLE").unwrap_err();
        assert!(err
            .to_string()
            .contains("DEPLOY_TEST_SURELY_UNSET_VARIABLE is not exported"));
    }

    #[test]
    fn present_environment_variable_is_returned() {
        // PATH is set in every test environment.
        assert!(!required_env("PATH").unwrap().is_empty());
    }
}
