//! Port traits implemented by the infrastructure crates.
//!
//! The orchestrator only ever sees these traits: `github` implements
//! [`SourceControl`] and [`SourceControlProvider`], `tools` implements
//! [`VersionControl`] and [`ClusterApplier`]. Tests substitute in-memory fakes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    AccessToken, ApplyMode, BranchName, ClusterError, CommandOutput, CommitSha, CommitState,
    Namespace, NewPullRequest, PullRequest, PullRequestNumber, RepositoryTarget,
    SourceControlError, VersionControlError,
};

// ---------------------------------------------------------------------------
// Source control
// ---------------------------------------------------------------------------

/// Source-control API operations, bound to one repository.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Sets the commit status `context` on `sha`.
    async fn create_status(
        &self,
        sha: &CommitSha,
        state: CommitState,
        description: &str,
        context: &str,
    ) -> Result<(), SourceControlError>;

    /// Adds a comment to the pull request conversation.
    async fn create_comment(
        &self,
        number: PullRequestNumber,
        body: &str,
    ) -> Result<(), SourceControlError>;

    /// Merges branch `head` into branch `base` on the server.
    ///
    /// Returns the new merge commit, or `None` when `base` already contains
    /// `head` and nothing was merged.
    async fn merge_branch(
        &self,
        base: &BranchName,
        head: &BranchName,
    ) -> Result<Option<CommitSha>, SourceControlError>;

    /// Merges the pull request with `message` as the commit message.
    async fn merge_pull_request(
        &self,
        number: PullRequestNumber,
        message: &str,
    ) -> Result<(), SourceControlError>;

    /// Deletes the branch reference `heads/<branch>`.
    async fn delete_ref(&self, branch: &BranchName) -> Result<(), SourceControlError>;

    /// Fetches the current state of a pull request.
    async fn get_pull_request(
        &self,
        number: PullRequestNumber,
    ) -> Result<PullRequest, SourceControlError>;

    /// Opens a pull request and returns its number.
    async fn create_pull_request(
        &self,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestNumber, SourceControlError>;

    /// Adds labels to a pull request.
    async fn add_labels(
        &self,
        number: PullRequestNumber,
        labels: &[String],
    ) -> Result<(), SourceControlError>;
}

/// Creates [`SourceControl`] clients for a repository.
///
/// Each request carries its own API URL and token, so the orchestrator
/// connects once per request rather than holding a single client.
pub trait SourceControlProvider: Send + Sync {
    /// Returns a client bound to `target`.
    fn connect(&self, target: &RepositoryTarget)
        -> Result<Arc<dyn SourceControl>, SourceControlError>;
}

// ---------------------------------------------------------------------------
// Version control
// ---------------------------------------------------------------------------

/// Committer identity recorded in the working copy's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// `user.name`.
    pub name: String,
    /// `user.email`.
    pub email: String,
}

/// What to clone and how to authenticate.
#[derive(Debug, Clone, Copy)]
pub struct CloneSpec<'a> {
    /// Clone URL (`https://…/owner/repo.git`).
    pub url: &'a str,
    /// Branch to check out after cloning; the remote default when `None`.
    pub branch: Option<&'a BranchName>,
    /// Token presented as the HTTP password.
    pub token: &'a AccessToken,
    /// Committer identity, needed only when the working copy will commit.
    pub identity: Option<&'a CommitIdentity>,
}

/// Version-control primitives run against a local working copy.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clones `spec.url` into `destination`.
    async fn clone_repository(
        &self,
        spec: CloneSpec<'_>,
        destination: &Path,
    ) -> Result<(), VersionControlError>;

    /// Checks out `revision` (a commit SHA or branch name).
    async fn checkout(&self, working_copy: &Path, revision: &str)
        -> Result<(), VersionControlError>;

    /// Lists the paths changed between the working tree and `base`, one per
    /// line, exactly as the diff primitive printed them.
    async fn diff_names(
        &self,
        working_copy: &Path,
        base: &CommitSha,
    ) -> Result<String, VersionControlError>;

    /// Creates and checks out a new branch at the current HEAD.
    async fn create_branch(
        &self,
        working_copy: &Path,
        branch: &BranchName,
    ) -> Result<(), VersionControlError>;

    /// Removes `path` from the index and working tree; absent paths are ignored.
    async fn remove_path(&self, working_copy: &Path, path: &str)
        -> Result<(), VersionControlError>;

    /// Stages every change in the working tree.
    async fn add_all(&self, working_copy: &Path) -> Result<(), VersionControlError>;

    /// Commits the index with `message`. Empty commits are allowed.
    async fn commit(&self, working_copy: &Path, message: &str)
        -> Result<(), VersionControlError>;

    /// Pushes `branch` to the `origin` remote.
    async fn push(&self, working_copy: &Path, branch: &BranchName)
        -> Result<(), VersionControlError>;
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// The cluster-apply executable.
#[async_trait]
pub trait ClusterApplier: Send + Sync {
    /// Hands `manifests` to the cluster, scoped to `namespace`.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`]; an
    /// `Err` means the executable could not be run at all.
    async fn apply(
        &self,
        namespace: &Namespace,
        manifests: &str,
        mode: ApplyMode,
    ) -> Result<CommandOutput, ClusterError>;
}
