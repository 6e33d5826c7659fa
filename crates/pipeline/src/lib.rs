//! Deployment orchestration domain for the GitOps agent.
//!
//! A pull request against the cluster repository arrives as a
//! [`DeploymentRequest`]. The single [`Worker`] takes requests off the
//! [`DeploymentQueue`] one at a time and hands each to the [`Orchestrator`],
//! which reports a pending status, merges the base branch in if needed,
//! resolves the changed top-level directories, bundles their manifests,
//! validates and applies each bundle, and finally reports, merges and cleans
//! up.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** Infrastructure crates implement the
//! traits in [`ports`]; this crate never talks to the network or spawns a
//! process itself.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`Namespace`, `CommitSha`, …) |
//! | [`types`] | Value types (`DeploymentRequest`, `ChangeSet`, `ManifestBundle`, …) |
//! | [`lifecycle`] | Per-request state machine |
//! | [`errors`] | Error taxonomy |
//! | [`ports`] | Source-control, version-control and cluster traits |
//! | [`change_scope`] | Changed top-level directories from a diff |
//! | [`manifests`] | YAML collection |
//! | [`apply_gate`] | Validate-then-apply protocol |
//! | [`reporter`] | Status/comment reporting and result formatting |
//! | [`orchestrator`] | The deployment state machine |
//! | [`queue`] | Bounded queue and the single worker |
//! | [`requester`] | Raising deployment pull requests |

pub mod apply_gate;
pub mod change_scope;
pub mod errors;
pub mod identifiers;
pub mod lifecycle;
pub mod manifests;
pub mod orchestrator;
pub mod ports;
pub mod queue;
pub mod reporter;
pub mod requester;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use apply_gate::ApplyGate;
pub use change_scope::changed_directories;
pub use errors::{
    ApplyError, ClusterError, CollectionError, DeployError, QueueError, RequestError,
    SourceControlError, VersionControlError,
};
pub use identifiers::{
    BranchName, CommitSha, DeploymentId, Namespace, Owner, PullRequestNumber, RepositoryName,
};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleState};
pub use orchestrator::{DeploymentOutcome, Orchestrator, OrchestratorConfig};
pub use ports::{
    ClusterApplier, CloneSpec, CommitIdentity, SourceControl, SourceControlProvider,
    VersionControl,
};
pub use queue::{deployment_queue, DeploymentHandler, DeploymentQueue, Worker, DEFAULT_QUEUE_CAPACITY};
pub use reporter::StatusReporter;
pub use requester::{DeploymentPrRequester, DeploymentPrSpec};
pub use types::{
    AccessToken, ApplyMode, ApplyOutcome, ChangeSet, CommandOutput, CommitState, ManifestBundle,
    MergeableState, NewPullRequest, PullRequest, RepositoryTarget, DeploymentRequest, Timestamp,
};
