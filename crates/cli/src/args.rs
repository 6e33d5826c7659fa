//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use listener::{DEFAULT_PORT, DEFAULT_WEBHOOK_PATH};
use pipeline::orchestrator::DEFAULT_STATUS_CONTEXT;
use pipeline::DEFAULT_QUEUE_CAPACITY;

/// GitOps deployment agent: applies the manifests of merged-to-be pull
/// requests to a Kubernetes cluster.
#[derive(Debug, Parser)]
#[command(name = "deploy", version, about, long_about = None)]
pub struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "DEPLOY_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Newline-delimited JSON.
    Json,
    /// Human-readable lines.
    Text,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Listen for pull-request webhooks and deploy them.
    Agent(AgentArgs),
    /// Raise a pull request against the cluster repository with the
    /// manifests to deploy.
    #[command(alias = "pr")]
    Request(RequestArgs),
}

#[derive(Debug, Args)]
pub struct AgentArgs {
    /// Port to listen on.
    #[arg(long, short, env = "DEPLOY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Route webhook deliveries are posted to.
    #[arg(long, default_value = DEFAULT_WEBHOOK_PATH)]
    pub path: String,

    /// Cluster-apply executable.
    #[arg(long, env = "DEPLOY_KUBECTL", default_value = "kubectl")]
    pub kubectl: PathBuf,

    /// Commit-status context to report under.
    #[arg(long, default_value = DEFAULT_STATUS_CONTEXT)]
    pub status_context: String,

    /// Pending requests held before webhook handlers start waiting.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Namespace (top-level directory in the cluster repository).
    #[arg(long)]
    pub namespace: String,

    /// Directory holding the Kubernetes manifests.
    #[arg(long, alias = "manifestDir", default_value = ".")]
    pub manifest_dir: PathBuf,

    /// Commit SHA the manifests were built from.
    #[arg(long)]
    pub sha: String,

    /// Label to add to the pull request; repeatable.
    #[arg(long = "label", short = 'l')]
    pub labels: Vec<String>,

    /// Organisation owning the cluster repository.
    #[arg(long)]
    pub org: String,

    /// Cluster repository name.
    #[arg(long)]
    pub repo: String,

    /// GitHub web URL.
    #[arg(long, alias = "githubURL", default_value = "https://github.com")]
    pub github_url: String,

    /// GitHub API URL.
    #[arg(long, alias = "apiURL", default_value = "https://api.github.com/")]
    pub api_url: String,

    /// Branch the pull request targets.
    #[arg(long, default_value = "master")]
    pub base: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_defaults() {
        let cli = Cli::try_parse_from(["deploy", "agent"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Text);
        let Command::Agent(args) = cli.command else {
            panic!("expected agent");
        };
        assert_eq!(args.port, 3016);
        assert_eq!(args.path, "/webhooks");
        assert_eq!(args.kubectl, PathBuf::from("kubectl"));
        assert_eq!(args.status_context, "deploy");
        assert_eq!(args.queue_capacity, 100);
    }

    #[test]
    fn request_flags() {
        let cli = Cli::try_parse_from([
            "deploy",
            "--log-format",
            "json",
            "request",
            "--namespace",
            "guestbook",
            "--manifest-dir",
            "example/guestbook",
            "--sha",
            "41e8650",
            "--org",
            "redbadger",
            "--repo",
            "cluster-local",
            "-l",
            "foo=bar",
            "--label",
            "baz=quux",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Command::Request(args) = cli.command else {
            panic!("expected request");
        };
        assert_eq!(args.namespace, "guestbook");
        assert_eq!(args.manifest_dir, PathBuf::from("example/guestbook"));
        assert_eq!(args.labels, ["foo=bar", "baz=quux"]);
        assert_eq!(args.github_url, "https://github.com");
        assert_eq!(args.api_url, "https://api.github.com/");
        assert_eq!(args.base, "master");
    }

    #[test]
    fn request_requires_namespace_and_sha() {
        assert!(Cli::try_parse_from(["deploy", "request", "--org", "o", "--repo", "r"]).is_err());
    }

    #[test]
    fn pr_is_an_alias_for_request() {
        let cli = Cli::try_parse_from([
            "deploy", "pr", "--namespace", "n", "--sha", "s", "--org", "o", "--repo", "r",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Request(_)));
    }
}
