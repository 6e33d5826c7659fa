//! The deployment state machine for one request.
//!
//! See [`crate::lifecycle`] for the states. The orchestrator is the error
//! boundary: everything below it returns typed errors, and everything it
//! returns is either a finished [`DeploymentOutcome`] or a [`DeployError`]
//! the worker logs before moving on.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::apply_gate::ApplyGate;
use crate::change_scope::changed_directories;
use crate::reporter::{format_results, namespace_list, StatusReporter};
use crate::{
    manifests, ApplyError, ApplyOutcome, ClusterApplier, CloneSpec, CommitSha, CommitState,
    DeployError, DeploymentId, DeploymentRequest, Lifecycle, LifecycleState, ManifestBundle,
    MergeableState, Namespace, PullRequest, SourceControl, SourceControlProvider, VersionControl,
};

/// Commit-status context used when none is configured.
pub const DEFAULT_STATUS_CONTEXT: &str = "deploy";

/// Tunables for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Commit-status context the agent reports under.
    pub status_context: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            status_context: DEFAULT_STATUS_CONTEXT.to_string(),
        }
    }
}

/// How a request ended.
#[derive(Debug)]
pub struct DeploymentOutcome {
    /// Request this outcome belongs to.
    pub deployment: DeploymentId,
    /// Every lifecycle state entered, ending in a terminal state.
    pub history: Vec<LifecycleState>,
    /// Directories applied successfully, keyed (and therefore sorted) by name.
    pub applied: BTreeMap<Namespace, ApplyOutcome>,
    /// The base-branch merge commit that made this request obsolete.
    pub superseded_by: Option<CommitSha>,
    /// The reported failure that ended the request, if it ended in `Failed`.
    pub failure: Option<DeployError>,
}

impl DeploymentOutcome {
    /// The terminal state the request reached.
    pub fn state(&self) -> LifecycleState {
        self.history.last().copied().unwrap_or(LifecycleState::Pending)
    }

    fn finish(deployment: DeploymentId, lifecycle: Lifecycle) -> Self {
        Self {
            deployment,
            history: lifecycle.history().to_vec(),
            applied: BTreeMap::new(),
            superseded_by: None,
            failure: None,
        }
    }
}

enum Prepared {
    /// Merging the base branch produced this commit; a later event deploys it.
    Superseded(CommitSha),
    Ready {
        pr: PullRequest,
        bundles: Vec<ManifestBundle>,
    },
}

/// Drives one [`DeploymentRequest`] through the lifecycle.
pub struct Orchestrator {
    source_control: Arc<dyn SourceControlProvider>,
    vcs: Arc<dyn VersionControl>,
    cluster: Arc<dyn ClusterApplier>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates an orchestrator over the given adapters.
    pub fn new(
        source_control: Arc<dyn SourceControlProvider>,
        vcs: Arc<dyn VersionControl>,
        cluster: Arc<dyn ClusterApplier>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            source_control,
            vcs,
            cluster,
            config,
        }
    }

    /// Deploys `request` to completion.
    #[instrument(
        skip_all,
        fields(
            deployment_id = %request.id,
            owner = %request.target.owner,
            repo = %request.target.repository,
            pr = %request.number,
        )
    )]
    pub async fn deploy(&self, request: DeploymentRequest) -> Result<DeploymentOutcome, DeployError> {
        let client = self.source_control.connect(&request.target)?;
        let reporter = StatusReporter::new(
            Arc::clone(&client),
            request.number,
            request.head_sha.clone(),
            self.config.status_context.clone(),
        );
        let mut lifecycle = Lifecycle::new();

        // Pending: without a visible status there is no point continuing.
        // After this point every failure is reported on the pull request.
        let started = "Deployment started!";
        reporter
            .report(CommitState::Pending, started, started)
            .await
            .map_err(|source| DeployError::Reporting {
                stage: "pending",
                source,
            })?;

        let (pr, bundles) = match self.prepare(&request, client.as_ref(), &mut lifecycle).await {
            Ok(Prepared::Ready { pr, bundles }) => (pr, bundles),
            Ok(Prepared::Superseded(commit)) => {
                lifecycle.advance(LifecycleState::Abandoned)?;
                let msg = format!("Master was merged so deployment will occur on commit {commit}");
                reporter
                    .report(CommitState::Success, &msg, &msg)
                    .await
                    .map_err(|source| DeployError::Reporting {
                        stage: "abandoned",
                        source,
                    })?;
                let mut outcome = DeploymentOutcome::finish(request.id, lifecycle);
                outcome.superseded_by = Some(commit);
                return Ok(outcome);
            }
            Err(err @ DeployError::Lifecycle(_)) => return Err(err),
            Err(failure) => {
                return self
                    .fail(request.id, lifecycle, &reporter, failure, None)
                    .await;
            }
        };

        // Applying
        lifecycle.advance(LifecycleState::Applying)?;
        let gate = ApplyGate::new(self.cluster.as_ref());
        let mut applied = BTreeMap::new();
        for bundle in &bundles {
            let outcome = gate.apply(bundle).await;
            if !outcome.success {
                let failure = ApplyError {
                    namespace: bundle.namespace().clone(),
                    detail: outcome.error.clone().unwrap_or_default(),
                    output: outcome.output.clone(),
                };
                let comment = format!("Deployment failed!\n{}", outcome.output);
                return self
                    .fail(
                        request.id,
                        lifecycle,
                        &reporter,
                        DeployError::Apply(failure),
                        Some(&comment),
                    )
                    .await;
            }
            applied.insert(bundle.namespace().clone(), outcome);
        }

        // Succeeded. From here on the success status stands; later errors
        // only reach the worker log.
        lifecycle.advance(LifecycleState::Succeeded)?;
        let outputs: BTreeMap<Namespace, String> = applied
            .iter()
            .map(|(ns, outcome)| (ns.clone(), outcome.output.clone()))
            .collect();
        let msg = format!("deployment of {} succeeded", namespace_list(applied.keys()));
        let comment = format!("Deployment succeeded!\n{}", format_results(&outputs));
        reporter
            .report(CommitState::Success, &msg, &comment)
            .await
            .map_err(|source| DeployError::Reporting {
                stage: "success",
                source,
            })?;

        lifecycle.advance(LifecycleState::Merging)?;
        client.merge_pull_request(request.number, &msg).await?;

        lifecycle.advance(LifecycleState::CleaningUp)?;
        client.delete_ref(&pr.head_ref).await?;

        lifecycle.advance(LifecycleState::Done)?;
        info!(directories = applied.len(), "deployment done");
        let mut outcome = DeploymentOutcome::finish(request.id, lifecycle);
        outcome.applied = applied;
        Ok(outcome)
    }

    /// Runs the base-branch check and walks the working copy, leaving the
    /// lifecycle in `Walking` when bundles are ready. Any error returned here
    /// is reported by the caller.
    async fn prepare(
        &self,
        request: &DeploymentRequest,
        client: &dyn SourceControl,
        lifecycle: &mut Lifecycle,
    ) -> Result<Prepared, DeployError> {
        lifecycle.advance(LifecycleState::MasterMergeCheck)?;
        let pr = client.get_pull_request(request.number).await?;
        match &pr.mergeable_state {
            MergeableState::Dirty => {
                return Err(DeployError::Conflict {
                    base: pr.base_ref.to_string(),
                })
            }
            MergeableState::Unknown => return Err(DeployError::MergeableStateUnknown),
            _ => {}
        }

        info!(base = %pr.base_ref, head = %pr.head_ref, "merging base branch into head");
        if let Some(commit) = client.merge_branch(&pr.head_ref, &pr.base_ref).await? {
            return Ok(Prepared::Superseded(commit));
        }

        lifecycle.advance(LifecycleState::Walking)?;
        let scratch = tempfile::Builder::new()
            .prefix("deploy-")
            .tempdir()
            .map_err(DeployError::Scratch)?;
        let bundles = self.walk(request, &pr, scratch.path()).await?;
        Ok(Prepared::Ready { pr, bundles })
    }

    /// Clones the head revision, resolves the change scope and bundles the
    /// manifests of every changed directory that has any.
    async fn walk(
        &self,
        request: &DeploymentRequest,
        pr: &PullRequest,
        scratch: &std::path::Path,
    ) -> Result<Vec<ManifestBundle>, DeployError> {
        let working_copy = scratch.join("src");
        let spec = CloneSpec {
            url: &request.clone_url,
            branch: Some(&pr.head_ref),
            token: &request.target.token,
            identity: None,
        };
        self.vcs
            .clone_repository(spec, &working_copy)
            .await
            .map_err(DeployError::Workspace)?;
        self.vcs
            .checkout(&working_copy, pr.head_sha.as_str())
            .await
            .map_err(DeployError::Workspace)?;

        let changes = changed_directories(self.vcs.as_ref(), &working_copy, &pr.base_sha).await?;

        let mut bundles = Vec::new();
        for namespace in &changes {
            info!(directory = %namespace, "walking");
            let documents = manifests::collect(&working_copy, namespace)?;
            match ManifestBundle::new(namespace.clone(), documents) {
                Some(bundle) => bundles.push(bundle),
                None => debug!(directory = %namespace, "no manifests; skipping"),
            }
        }
        Ok(bundles)
    }

    /// Reports `failure` as an error status and ends the request in `Failed`.
    async fn fail(
        &self,
        deployment: DeploymentId,
        mut lifecycle: Lifecycle,
        reporter: &StatusReporter,
        failure: DeployError,
        comment: Option<&str>,
    ) -> Result<DeploymentOutcome, DeployError> {
        lifecycle.advance(LifecycleState::Failed)?;
        let msg = failure.to_string();
        warn!(error = %msg, "deployment failed");
        reporter
            .report(CommitState::Error, &msg, comment.unwrap_or(&msg))
            .await
            .map_err(|source| DeployError::Reporting {
                stage: "error",
                source,
            })?;
        let mut outcome = DeploymentOutcome::finish(deployment, lifecycle);
        outcome.failure = Some(failure);
        Ok(outcome)
    }
}
