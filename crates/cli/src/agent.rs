//! `deploy agent`: webhook listener plus the deployment worker.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use github::GitHubProvider;
use listener::{router, WebhookSecret, WebhookState};
use pipeline::{deployment_queue, AccessToken, Orchestrator, OrchestratorConfig};
use tokio::net::TcpListener;
use tools::{GitCli, Kubectl};
use tracing::info;

use crate::args::AgentArgs;
use crate::{required_env, SECRET_ENV, TOKEN_ENV};

pub async fn run(args: AgentArgs) -> Result<()> {
    let secret = WebhookSecret::new(required_env(SECRET_ENV)?)
        .with_context(|| format!("{SECRET_ENV} is not a usable secret"))?;
    let token = AccessToken::new(required_env(TOKEN_ENV)?)
        .with_context(|| format!("{TOKEN_ENV} is empty"))?;

    let orchestrator = Orchestrator::new(
        Arc::new(GitHubProvider::new().context("creating GitHub client")?),
        Arc::new(GitCli::default()),
        Arc::new(Kubectl::new(&args.kubectl)),
        OrchestratorConfig {
            status_context: args.status_context,
        },
    );

    let (queue, worker) = deployment_queue(args.queue_capacity);
    let worker = tokio::spawn(worker.run(Arc::new(orchestrator)));

    let app = router(&args.path, WebhookState { queue, secret, token });
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let socket = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    listener::serve(socket, app, shutdown_signal())
        .await
        .context("serving webhooks")?;

    // The router and every queue handle are gone now; the worker finishes
    // what is already queued and stops.
    let processed = worker.await.context("deployment worker")?;
    info!(processed, "agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
