//! Connecting clients per repository.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{RepositoryTarget, SourceControl, SourceControlError, SourceControlProvider};

use crate::api_root::api_root;
use crate::client::GitHubClient;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `User-Agent` sent with every request; GitHub rejects requests without one.
const USER_AGENT: &str = concat!("deploy-agent/", env!("CARGO_PKG_VERSION"));

/// Hands out [`GitHubClient`]s sharing one connection pool.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    http: reqwest::Client,
}

impl GitHubProvider {
    /// Creates a provider with a pooled HTTP client.
    pub fn new() -> Result<Self, SourceControlError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SourceControlError::Transport {
                operation: "build http client",
                message: err.to_string(),
            })?;
        Ok(Self { http })
    }

    /// Creates a provider over an existing HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl SourceControlProvider for GitHubProvider {
    fn connect(
        &self,
        target: &RepositoryTarget,
    ) -> Result<Arc<dyn SourceControl>, SourceControlError> {
        let root = api_root(&target.api_url)?;
        Ok(Arc::new(GitHubClient::new(
            self.http.clone(),
            root,
            target.owner.clone(),
            target.repository.clone(),
            target.token.clone(),
        )))
    }
}
