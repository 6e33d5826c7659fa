//! Shared value types for the deployment pipeline.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! invariants of their own (a [`ChangeSet`] never holds a duplicate, a
//! [`ManifestBundle`] always starts with its namespace document) and are what
//! the orchestrator passes between stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BranchName, CommitSha, DeploymentId, Namespace, Owner, PullRequestNumber, RepositoryName};

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A source-control access token.
///
/// The `Debug` implementation is redacted so a token never reaches a log line
/// through a derived `Debug` of a containing type.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a token, returning `None` if it is empty.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let t = token.into();
        if t.is_empty() {
            None
        } else {
            Some(Self(t))
        }
    }

    /// Returns the raw token for use in an `Authorization` header or a git
    /// credential file.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Everything needed to reach one repository through the source-control API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    /// Repository API URL as reported by the webhook payload
    /// (e.g. `https://api.github.com/repos/my-org/cluster`). The API root is
    /// derived from it by the adapter.
    pub api_url: String,
    /// Repository owner.
    pub owner: Owner,
    /// Repository name.
    pub repository: RepositoryName,
    /// Token used for every API call.
    pub token: AccessToken,
}

/// One deployment to perform, created at ingestion and consumed once by the
/// worker.
///
/// The head and base revisions recorded here are the ones the webhook
/// announced. The orchestrator re-fetches the pull request before walking the
/// repository and deploys the revisions the API reports at that point.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    /// Correlation identifier, generated at ingestion.
    pub id: DeploymentId,
    /// When the event was accepted.
    pub received_at: Timestamp,
    /// Repository coordinates and credentials.
    pub target: RepositoryTarget,
    /// URL the working copy is cloned from.
    pub clone_url: String,
    /// Pull request being deployed.
    pub number: PullRequestNumber,
    /// Head branch of the pull request.
    pub head_ref: BranchName,
    /// Head revision announced by the event; commit statuses attach here.
    pub head_sha: CommitSha,
    /// Base revision announced by the event.
    pub base_sha: CommitSha,
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// Commit status states the agent reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    /// Deployment in progress.
    Pending,
    /// Deployment finished (or was superseded by a base-branch merge).
    Success,
    /// Deployment could not be completed.
    Error,
}

impl CommitState {
    /// Returns the wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-control readiness of a pull request to be merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MergeableState {
    /// No conflicts, all checks satisfied.
    Clean,
    /// Merge conflicts with the base branch.
    Dirty,
    /// Blocked by branch protection.
    Blocked,
    /// Head branch is behind the base branch.
    Behind,
    /// Mergeable with failing non-required checks.
    Unstable,
    /// Mergeable, pre-receive hooks pending.
    HasHooks,
    /// Draft pull request.
    Draft,
    /// Not computed yet.
    Unknown,
    /// A state this agent does not know about.
    Other(String),
}

impl MergeableState {
    /// Parses the API representation. Missing values count as [`Self::Unknown`].
    pub fn from_api(value: Option<&str>) -> Self {
        match value {
            None | Some("unknown") => Self::Unknown,
            Some("clean") => Self::Clean,
            Some("dirty") => Self::Dirty,
            Some("blocked") => Self::Blocked,
            Some("behind") => Self::Behind,
            Some("unstable") => Self::Unstable,
            Some("has_hooks") => Self::HasHooks,
            Some("draft") => Self::Draft,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// The parts of a pull request the orchestrator needs, as currently reported
/// by the source-control system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Pull request number.
    pub number: PullRequestNumber,
    /// Head branch name.
    pub head_ref: BranchName,
    /// Current head revision.
    pub head_sha: CommitSha,
    /// Base branch name (normally the repository's default branch).
    pub base_ref: BranchName,
    /// Current base revision.
    pub base_sha: CommitSha,
    /// Mergeability as computed by the source-control system.
    pub mergeable_state: MergeableState,
}

/// A pull request to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Title line.
    pub title: String,
    /// Branch containing the changes.
    pub head: BranchName,
    /// Branch the changes should be merged into.
    pub base: BranchName,
    /// Description body.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Change scope
// ---------------------------------------------------------------------------

/// Ordered set of top-level directories touched between two revisions.
///
/// Insertion order is preserved and duplicates are suppressed, so the
/// deployment order follows the order in which the diff first mentions each
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(Vec<Namespace>);

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `namespace` unless already present. Returns `true` if it was added.
    pub fn insert(&mut self, namespace: Namespace) -> bool {
        if self.0.contains(&namespace) {
            false
        } else {
            self.0.push(namespace);
            true
        }
    }

    /// Builds a change set from repository-relative changed paths.
    ///
    /// Paths without a `/` (files at the repository root) are ignored.
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = Self::new();
        for path in paths {
            if let Some(namespace) = Namespace::from_changed_path(path) {
                set.insert(namespace);
            }
        }
        set
    }

    /// Iterates the directories in first-seen order.
    pub fn iter(&self) -> std::slice::Iter<'_, Namespace> {
        self.0.iter()
    }

    /// Number of directories.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no directory changed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Namespace;
    type IntoIter = std::slice::Iter<'a, Namespace>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

/// YAML document separator used between bundled documents.
pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// The manifests of one directory, ready to hand to the cluster.
///
/// Element 0 of [`Self::documents`] is always the synthesized namespace
/// declaration; every document ends with exactly one newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBundle {
    namespace: Namespace,
    documents: Vec<String>,
}

impl ManifestBundle {
    /// Bundles the collected documents of `namespace`.
    ///
    /// Returns `None` when `collected` is empty: a directory without manifests
    /// produces no bundle and is skipped.
    pub fn new(namespace: Namespace, collected: Vec<String>) -> Option<Self> {
        if collected.is_empty() {
            return None;
        }
        let mut documents = Vec::with_capacity(collected.len() + 1);
        documents.push(namespace_document(&namespace));
        documents.extend(collected.iter().map(|doc| normalize_document(doc)));
        Some(Self {
            namespace,
            documents,
        })
    }

    /// The namespace this bundle deploys into.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Documents in apply order, namespace declaration first.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Renders the multi-document YAML stream passed to the cluster.
    pub fn render(&self) -> String {
        self.documents.join(DOCUMENT_SEPARATOR)
    }
}

// Prepending a fresh namespace declaration replaces any labels or annotations
// already set on a live namespace object.
fn namespace_document(namespace: &Namespace) -> String {
    format!("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: {namespace}\n")
}

fn normalize_document(doc: &str) -> String {
    let mut doc = doc.trim_end_matches(['\n', '\r']).to_string();
    doc.push('\n');
    doc
}

// ---------------------------------------------------------------------------
// Process output and apply results
// ---------------------------------------------------------------------------

/// Result of running an external command whose output was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Combined standard output and standard error, in write order.
    pub output: String,
}

/// How a manifest bundle is handed to the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyMode {
    /// Server-side validation only; cluster state is not changed.
    Validate,
    /// Real apply.
    Apply,
}

impl std::fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validate => f.write_str("validation"),
            Self::Apply => f.write_str("apply"),
        }
    }
}

/// Result of pushing one directory's bundle through the apply gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// `true` when both validation and the real apply succeeded.
    pub success: bool,
    /// Combined output of the last pass that ran.
    pub output: String,
    /// What went wrong, if anything.
    pub error: Option<String>,
}

impl ApplyOutcome {
    /// A successful apply with its captured output.
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// A failed pass with its captured output and error detail.
    pub fn failed(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Milliseconds from `self` until now; negative if `self` lies in the
    /// future.
    pub fn elapsed_ms(self) -> i64 {
        (Utc::now() - self.0).num_milliseconds()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> Namespace {
        Namespace::new(name).unwrap()
    }

    #[test]
    fn change_set_preserves_first_seen_order_and_drops_duplicates() {
        let set = ChangeSet::from_paths([
            "app2/deploy.yml",
            "README.md",
            "app1/service.yaml",
            "app2/nested/config.yml",
            "app1/x",
        ]);
        let names: Vec<&str> = set.iter().map(Namespace::as_str).collect();
        assert_eq!(names, ["app2", "app1"]);
    }

    #[test]
    fn change_set_never_contains_a_separator() {
        let set = ChangeSet::from_paths(["a/b/c/d", "e/f", "g", "", "h/"]);
        assert!(set.iter().all(|n| !n.as_str().contains('/')));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn bundle_starts_with_namespace_document() {
        let bundle =
            ManifestBundle::new(ns("my-namespace"), vec!["a\n".into(), "b\n".into()]).unwrap();
        assert_eq!(
            bundle.documents()[0],
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: my-namespace\n"
        );
        assert_eq!(&bundle.documents()[1..], ["a\n", "b\n"]);
        assert_eq!(
            bundle.render(),
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: my-namespace\n---\na\n---\nb\n"
        );
    }

    #[test]
    fn bundle_documents_end_with_exactly_one_newline() {
        let bundle = ManifestBundle::new(
            ns("ns"),
            vec!["no-newline".into(), "many\n\n\n".into(), "crlf\r\n".into()],
        )
        .unwrap();
        for doc in bundle.documents() {
            assert!(doc.ends_with('\n'));
            assert!(!doc.ends_with("\n\n"), "{doc:?}");
        }
    }

    #[test]
    fn empty_collection_produces_no_bundle() {
        assert!(ManifestBundle::new(ns("empty"), Vec::new()).is_none());
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("ghp_secret").unwrap();
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        assert_eq!(token.expose(), "ghp_secret");
    }

    #[test]
    fn mergeable_state_parses_api_values() {
        assert_eq!(MergeableState::from_api(Some("clean")), MergeableState::Clean);
        assert_eq!(MergeableState::from_api(Some("dirty")), MergeableState::Dirty);
        assert_eq!(MergeableState::from_api(None), MergeableState::Unknown);
        assert_eq!(
            MergeableState::from_api(Some("weird")),
            MergeableState::Other("weird".to_string())
        );
    }

    #[test]
    fn elapsed_ms_counts_from_the_timestamp() {
        let earlier = Timestamp(Utc::now() - chrono::Duration::seconds(2));
        assert!(earlier.elapsed_ms() >= 2_000);
        assert!(Timestamp::now().elapsed_ms() < 2_000);
    }
}
