//! `deploy request`: raise a deployment pull request.

use std::sync::Arc;

use anyhow::{Context, Result};
use github::{build_clone_url, GitHubProvider};
use pipeline::{
    AccessToken, BranchName, CommitSha, DeploymentPrRequester, DeploymentPrSpec, Namespace, Owner,
    RepositoryName, RepositoryTarget,
};
use tools::GitCli;
use tracing::info;

use crate::args::RequestArgs;
use crate::{required_env, TOKEN_ENV};

pub async fn run(args: RequestArgs) -> Result<()> {
    let token = AccessToken::new(required_env(TOKEN_ENV)?)
        .with_context(|| format!("{TOKEN_ENV} is empty"))?;
    let spec = spec(args, token)?;

    let requester = DeploymentPrRequester::new(
        Arc::new(GitHubProvider::new().context("creating GitHub client")?),
        Arc::new(GitCli::default()),
    );
    let number = requester
        .request(&spec)
        .await
        .context("raising deployment request")?;
    info!(pr = %number, namespace = %spec.namespace, "pull request raised");
    Ok(())
}

fn spec(args: RequestArgs, token: AccessToken) -> Result<DeploymentPrSpec> {
    let clone_url = build_clone_url(&args.github_url, &args.org, &args.repo)
        .with_context(|| format!("parsing GitHub URL {}", args.github_url))?;

    Ok(DeploymentPrSpec {
        namespace: Namespace::new(args.namespace).context("--namespace must not be empty")?,
        manifest_dir: args.manifest_dir,
        sha: CommitSha::new(args.sha).context("--sha must not be empty")?,
        labels: args.labels,
        target: RepositoryTarget {
            api_url: args.api_url,
            owner: Owner::new(args.org).context("--org must not be empty")?,
            repository: RepositoryName::new(args.repo).context("--repo must not be empty")?,
            token,
        },
        clone_url: clone_url.to_string(),
        base: BranchName::new(args.base).context("--base must not be empty")?,
    })
}
