//! Raising deployment pull requests against the cluster repository.
//!
//! This is the producer end of the GitOps loop: a CI job calls it with the
//! manifests it built, and the resulting pull request is what the agent later
//! deploys.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};
use walkdir::WalkDir;

use crate::{
    AccessToken, BranchName, CloneSpec, CommitIdentity, CommitSha, Namespace, NewPullRequest,
    PullRequestNumber, RepositoryTarget, RequestError, SourceControlProvider, VersionControl,
};

/// What to put up for deployment.
#[derive(Debug, Clone)]
pub struct DeploymentPrSpec {
    /// Namespace (top-level directory) the manifests belong to.
    pub namespace: Namespace,
    /// Local directory holding the manifests.
    pub manifest_dir: PathBuf,
    /// Commit of the application the manifests were built from.
    pub sha: CommitSha,
    /// Labels to add to the pull request.
    pub labels: Vec<String>,
    /// Cluster repository API coordinates.
    pub target: RepositoryTarget,
    /// Clone URL of the cluster repository.
    pub clone_url: String,
    /// Branch the pull request targets.
    pub base: BranchName,
}

impl DeploymentPrSpec {
    /// Branch the manifests are pushed to: `deploy-<sha>`.
    pub fn branch_name(&self) -> BranchName {
        BranchName::for_deployment(&self.sha)
    }
}

/// Opens deployment pull requests.
pub struct DeploymentPrRequester {
    source_control: Arc<dyn SourceControlProvider>,
    vcs: Arc<dyn VersionControl>,
    identity: CommitIdentity,
}

impl DeploymentPrRequester {
    /// Creates a requester committing as a robot identity.
    pub fn new(source_control: Arc<dyn SourceControlProvider>, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            source_control,
            vcs,
            identity: CommitIdentity {
                name: "Robot".to_string(),
                email: "robot".to_string(),
            },
        }
    }

    /// Replaces `<namespace>/` in the cluster repository with the contents of
    /// the manifest directory on a new branch and opens a pull request for it.
    #[instrument(skip_all, fields(namespace = %spec.namespace, sha = %spec.sha))]
    pub async fn request(&self, spec: &DeploymentPrSpec) -> Result<PullRequestNumber, RequestError> {
        if !spec.manifest_dir.is_dir() {
            return Err(RequestError::ManifestDir(spec.manifest_dir.clone()));
        }

        let branch = spec.branch_name();
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{branch}-"))
            .tempdir()
            .map_err(RequestError::Scratch)?;
        let working_copy = scratch.path().join("src");

        self.prepare_branch(spec, &spec.target.token, &branch, &working_copy)
            .await?;

        let client = self.source_control.connect(&spec.target)?;
        let number = client
            .create_pull_request(&NewPullRequest {
                title: format!("{} deployment request", spec.namespace),
                head: branch.clone(),
                base: spec.base.clone(),
                body: format!("Deployment request for {} at {}", spec.namespace, spec.sha),
            })
            .await?;
        info!(pr = %number, "pull request raised");

        if !spec.labels.is_empty() {
            client.add_labels(number, &spec.labels).await?;
        }
        Ok(number)
    }

    async fn prepare_branch(
        &self,
        spec: &DeploymentPrSpec,
        token: &AccessToken,
        branch: &BranchName,
        working_copy: &Path,
    ) -> Result<(), RequestError> {
        let clone = CloneSpec {
            url: &spec.clone_url,
            branch: Some(&spec.base),
            token,
            identity: Some(&self.identity),
        };
        self.vcs.clone_repository(clone, working_copy).await?;
        self.vcs.create_branch(working_copy, branch).await?;
        self.vcs
            .remove_path(working_copy, spec.namespace.as_str())
            .await?;

        copy_dir(&spec.manifest_dir, &working_copy.join(spec.namespace.as_str()))?;

        self.vcs.add_all(working_copy).await?;
        self.vcs
            .commit(working_copy, &format!("{} at {}", spec.namespace, spec.sha))
            .await?;
        self.vcs.push(working_copy, branch).await?;
        Ok(())
    }
}

/// Recursively copies the contents of `from` into `to`, creating `to`.
pub fn copy_dir(from: &Path, to: &Path) -> Result<(), RequestError> {
    let copy_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| RequestError::Copy { path, source }
    };

    for entry in WalkDir::new(from).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(from).to_path_buf();
            RequestError::Copy {
                path,
                source: err.into(),
            }
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(copy_err(entry.path()))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(copy_err(entry.path()))?;
        }
    }
    Ok(())
}
