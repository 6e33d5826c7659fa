//! In-memory fakes for the pipeline port traits (testing only).

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipeline::requester::copy_dir;
use pipeline::{
    AccessToken, ApplyMode, BranchName, CloneSpec, ClusterApplier, ClusterError, CommandOutput,
    CommitSha, CommitState, DeploymentId, DeploymentRequest, MergeableState, Namespace,
    NewPullRequest, Owner, PullRequest, PullRequestNumber, RepositoryName, RepositoryTarget,
    SourceControl, SourceControlError, SourceControlProvider, Timestamp, VersionControl,
    VersionControlError,
};

// ---------------------------------------------------------------------------
// Source control
// ---------------------------------------------------------------------------

/// One recorded source-control call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScCall {
    Status {
        sha: String,
        state: CommitState,
        description: String,
        context: String,
    },
    Comment(String),
    GetPullRequest,
    MergeBranch { base: String, head: String },
    MergePullRequest(String),
    DeleteRef(String),
    CreatePullRequest(NewPullRequest),
    AddLabels(Vec<String>),
}

/// Source-control fake that records every call.
#[derive(Debug)]
pub struct FakeSourceControl {
    pub calls: Mutex<Vec<ScCall>>,
    pub pull_request: PullRequest,
    pub merge_commit: Option<CommitSha>,
    pub fail_statuses: bool,
    pub fail_get_pull_request: bool,
    pub fail_branch_merge: bool,
    pub fail_pr_merge: bool,
    pub created_number: u64,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            pull_request: pull_request(MergeableState::Clean),
            merge_commit: None,
            fail_statuses: false,
            fail_get_pull_request: false,
            fail_branch_merge: false,
            fail_pr_merge: false,
            created_number: 7,
        }
    }

    pub fn calls(&self) -> Vec<ScCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<(CommitState, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ScCall::Status {
                    state, description, ..
                } => Some((state, description)),
                _ => None,
            })
            .collect()
    }

    pub fn comments(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ScCall::Comment(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ScCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn api_error(operation: &'static str) -> SourceControlError {
    SourceControlError::Api {
        operation,
        status: 500,
        message: "boom".into(),
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn create_status(
        &self,
        sha: &CommitSha,
        state: CommitState,
        description: &str,
        context: &str,
    ) -> Result<(), SourceControlError> {
        if self.fail_statuses {
            return Err(api_error("create status"));
        }
        self.record(ScCall::Status {
            sha: sha.to_string(),
            state,
            description: description.to_string(),
            context: context.to_string(),
        });
        Ok(())
    }

    async fn create_comment(
        &self,
        _number: PullRequestNumber,
        body: &str,
    ) -> Result<(), SourceControlError> {
        self.record(ScCall::Comment(body.to_string()));
        Ok(())
    }

    async fn merge_branch(
        &self,
        base: &BranchName,
        head: &BranchName,
    ) -> Result<Option<CommitSha>, SourceControlError> {
        self.record(ScCall::MergeBranch {
            base: base.to_string(),
            head: head.to_string(),
        });
        if self.fail_branch_merge {
            return Err(api_error("merge branch"));
        }
        Ok(self.merge_commit.clone())
    }

    async fn merge_pull_request(
        &self,
        _number: PullRequestNumber,
        message: &str,
    ) -> Result<(), SourceControlError> {
        self.record(ScCall::MergePullRequest(message.to_string()));
        if self.fail_pr_merge {
            return Err(api_error("merge pull request"));
        }
        Ok(())
    }

    async fn delete_ref(&self, branch: &BranchName) -> Result<(), SourceControlError> {
        self.record(ScCall::DeleteRef(branch.to_string()));
        Ok(())
    }

    async fn get_pull_request(
        &self,
        _number: PullRequestNumber,
    ) -> Result<PullRequest, SourceControlError> {
        self.record(ScCall::GetPullRequest);
        if self.fail_get_pull_request {
            return Err(api_error("get pull request"));
        }
        Ok(self.pull_request.clone())
    }

    async fn create_pull_request(
        &self,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestNumber, SourceControlError> {
        self.record(ScCall::CreatePullRequest(pull_request.clone()));
        Ok(PullRequestNumber::new(self.created_number))
    }

    async fn add_labels(
        &self,
        _number: PullRequestNumber,
        labels: &[String],
    ) -> Result<(), SourceControlError> {
        self.record(ScCall::AddLabels(labels.to_vec()));
        Ok(())
    }
}

/// Hands out the same fake for every connection.
pub struct FakeProvider(pub Arc<FakeSourceControl>);

impl SourceControlProvider for FakeProvider {
    fn connect(
        &self,
        _target: &RepositoryTarget,
    ) -> Result<Arc<dyn SourceControl>, SourceControlError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Version control
// ---------------------------------------------------------------------------

/// "Clones" by copying a fixture tree; diff output is scripted.
#[derive(Debug)]
pub struct FakeVcs {
    pub fixture: PathBuf,
    pub diff: Result<String, String>,
    pub fail_clone: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeVcs {
    pub fn new(fixture: &Path, diff: &str) -> Self {
        Self {
            fixture: fixture.to_path_buf(),
            diff: Ok(diff.to_string()),
            fail_clone: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn clone_repository(
        &self,
        spec: CloneSpec<'_>,
        destination: &Path,
    ) -> Result<(), VersionControlError> {
        self.record(format!(
            "clone {} {}",
            spec.url,
            spec.branch.map(BranchName::as_str).unwrap_or("-")
        ));
        if self.fail_clone {
            return Err(VersionControlError::Failed {
                command: "clone".into(),
                exit_code: Some(128),
                stderr: "repository not found".into(),
            });
        }
        copy_dir(&self.fixture, destination).map_err(|e| VersionControlError::Setup {
            command: "clone".into(),
            message: e.to_string(),
        })
    }

    async fn checkout(&self, _wc: &Path, revision: &str) -> Result<(), VersionControlError> {
        self.record(format!("checkout {revision}"));
        Ok(())
    }

    async fn diff_names(&self, _wc: &Path, base: &CommitSha) -> Result<String, VersionControlError> {
        self.record(format!("diff {base}"));
        self.diff.clone().map_err(|stderr| VersionControlError::Failed {
            command: "diff".into(),
            exit_code: Some(128),
            stderr,
        })
    }

    async fn create_branch(&self, _wc: &Path, branch: &BranchName) -> Result<(), VersionControlError> {
        self.record(format!("branch {branch}"));
        Ok(())
    }

    async fn remove_path(&self, wc: &Path, path: &str) -> Result<(), VersionControlError> {
        self.record(format!("rm {path}"));
        let _ = std::fs::remove_dir_all(wc.join(path));
        Ok(())
    }

    async fn add_all(&self, _wc: &Path) -> Result<(), VersionControlError> {
        self.record("add".into());
        Ok(())
    }

    async fn commit(&self, _wc: &Path, message: &str) -> Result<(), VersionControlError> {
        self.record(format!("commit {message}"));
        Ok(())
    }

    async fn push(&self, _wc: &Path, branch: &BranchName) -> Result<(), VersionControlError> {
        self.record(format!("push {branch}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// Cluster fake failing the configured `(namespace, mode)` pairs.
#[derive(Debug, Default)]
pub struct FakeCluster {
    pub failing: HashSet<(String, ApplyMode)>,
    pub calls: Mutex<Vec<(String, ApplyMode)>>,
}

impl FakeCluster {
    pub fn failing(namespace: &str, mode: ApplyMode) -> Self {
        let mut failing = HashSet::new();
        failing.insert((namespace.to_string(), mode));
        Self {
            failing,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, ApplyMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterApplier for FakeCluster {
    async fn apply(
        &self,
        namespace: &Namespace,
        _manifests: &str,
        mode: ApplyMode,
    ) -> Result<CommandOutput, ClusterError> {
        self.calls
            .lock()
            .unwrap()
            .push((namespace.to_string(), mode));
        let fail = self.failing.contains(&(namespace.to_string(), mode));
        Ok(CommandOutput {
            success: !fail,
            exit_code: Some(i32::from(fail)),
            output: if fail {
                format!("error: {namespace} {mode} rejected")
            } else {
                format!("namespace/{namespace} configured")
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn pull_request(mergeable_state: MergeableState) -> PullRequest {
    PullRequest {
        number: PullRequestNumber::new(3),
        head_ref: BranchName::new("deploy-abc").unwrap(),
        head_sha: CommitSha::new("headsha").unwrap(),
        base_ref: BranchName::new("master").unwrap(),
        base_sha: CommitSha::new("basesha").unwrap(),
        mergeable_state,
    }
}

pub fn target() -> RepositoryTarget {
    RepositoryTarget {
        api_url: "https://api.github.com/repos/org/cluster".into(),
        owner: Owner::new("org").unwrap(),
        repository: RepositoryName::new("cluster").unwrap(),
        token: AccessToken::new("token").unwrap(),
    }
}

pub fn request() -> DeploymentRequest {
    DeploymentRequest {
        id: DeploymentId::new_random(),
        received_at: Timestamp::now(),
        target: target(),
        clone_url: "https://github.com/org/cluster.git".into(),
        number: PullRequestNumber::new(3),
        head_ref: BranchName::new("deploy-abc").unwrap(),
        head_sha: CommitSha::new("webhooksha").unwrap(),
        base_sha: CommitSha::new("basesha").unwrap(),
    }
}

pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}
