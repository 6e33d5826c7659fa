//! Newtype domain identifiers.
//!
//! Every concept with an identity is a distinct newtype wrapping a primitive,
//! so a [`BranchName`] can never be passed where a [`CommitSha`] is expected
//! even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — source-control integers
// ---------------------------------------------------------------------------

/// Identifies a pull request within its repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Creates a new identifier from a raw integer.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one accepted deployment request.
///
/// Generated when the webhook is ingested and carried on every span the
/// worker opens for the request, so all activity for one pull-request event
/// can be correlated in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentId(Uuid);

impl DeploymentId {
    /// Generates a new random deployment identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (Git and source-control names)
// ---------------------------------------------------------------------------

string_id! {
    /// A Git branch name (e.g. `"master"`, `"deploy-41e8650"`).
    BranchName
}

string_id! {
    /// A Git commit SHA.
    CommitSha
}

impl BranchName {
    /// The branch a deployment request for `sha` is pushed to.
    pub fn for_deployment(sha: &CommitSha) -> Self {
        Self(format!("deploy-{sha}"))
    }
}

string_id! {
    /// The account or organisation that owns a repository.
    Owner
}

string_id! {
    /// A repository name, without its owner.
    RepositoryName
}

string_id! {
    /// A top-level directory of the cluster repository.
    ///
    /// Each top-level directory holds the manifests of exactly one Kubernetes
    /// namespace, and the directory name *is* the namespace name.
    Namespace
}

impl Namespace {
    /// Extracts the top-level directory from a repository-relative path.
    ///
    /// Returns `None` for paths without a `/` separator: files at the
    /// repository root belong to no namespace.
    pub fn from_changed_path(path: &str) -> Option<Self> {
        let (dir, _) = path.split_once('/')?;
        Self::new(dir)
    }
}
