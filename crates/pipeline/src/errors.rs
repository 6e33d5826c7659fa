//! Error types for the deployment pipeline.
//!
//! Port traits each have their own error type ([`SourceControlError`],
//! [`VersionControlError`], [`ClusterError`]); the orchestrator folds them into
//! [`DeployError`] at the request boundary, which is where the worker logs
//! them. Nothing here aborts the process.

use std::path::PathBuf;

use thiserror::Error;

use crate::{LifecycleError, Namespace};

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures talking to the source-control API.
#[derive(Debug, Error)]
pub enum SourceControlError {
    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("transport failure calling {operation}: {message}")]
    Transport {
        /// API operation being attempted.
        operation: &'static str,
        /// Underlying error text.
        message: String,
    },

    /// The API answered with an unexpected status code.
    #[error("{operation} returned HTTP {status}: {message}")]
    Api {
        /// API operation being attempted.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response from {operation}: {message}")]
    InvalidResponse {
        /// API operation being attempted.
        operation: &'static str,
        /// Decoding error.
        message: String,
    },

    /// The repository API URL does not identify a supported API root.
    #[error("cannot derive API root from '{url}': {reason}")]
    InvalidApiUrl {
        /// URL that was rejected.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Failures running a version-control primitive.
#[derive(Debug, Error)]
pub enum VersionControlError {
    /// The command could not be started.
    #[error("failed to run git {command}: {source}")]
    Spawn {
        /// Git subcommand.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("git {command} failed ({}): {stderr}", describe_exit(.exit_code))]
    Failed {
        /// Git subcommand.
        command: String,
        /// Exit code, `None` if killed by a signal.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// Preparing the command failed (credential file, URL rewriting).
    #[error("cannot prepare git {command}: {message}")]
    Setup {
        /// Git subcommand.
        command: String,
        /// What went wrong.
        message: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated by signal".to_string(),
    }
}

/// Failures invoking the cluster-apply executable.
///
/// A non-zero exit is *not* a [`ClusterError`]: it is a normal apply result
/// carried in [`crate::CommandOutput`]. This type covers the executable not
/// running at all.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The executable could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Executable path.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Feeding input to, or collecting output from, the process failed.
    #[error("I/O error talking to {program}: {source}")]
    Io {
        /// Executable path.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Fatal problems gathering manifests.
///
/// I/O errors while enumerating a subtree are not represented here: the
/// collector skips those subtrees and continues.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// A file-name pattern failed to compile. This is a programming defect.
    #[error("malformed manifest pattern '{pattern}': {source}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Compilation error.
        #[source]
        source: globset::Error,
    },
}

/// A directory whose bundle did not make it through the apply gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("deployment of {namespace} failed: {detail}")]
pub struct ApplyError {
    /// Directory (namespace) that failed.
    pub namespace: Namespace,
    /// Error detail.
    pub detail: String,
    /// Combined output of the failing pass.
    pub output: String,
}

/// Errors ending one deployment request.
///
/// Each variant corresponds to a class in the failure taxonomy; the worker
/// logs it and continues with the next request.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A source-control API call failed mid-request.
    #[error("source-control transport error: {0}")]
    Transport(#[from] SourceControlError),

    /// Reporting a status or comment failed.
    #[error("failed to report {stage} status: {source}")]
    Reporting {
        /// Lifecycle stage whose report failed.
        stage: &'static str,
        /// Underlying API error.
        #[source]
        source: SourceControlError,
    },

    /// The change scope could not be computed.
    #[error("cannot compute changed directories: {0}")]
    Diff(#[source] VersionControlError),

    /// Preparing the working copy (temporary directory, clone, checkout) failed.
    #[error("cannot prepare working copy: {0}")]
    Workspace(#[source] VersionControlError),

    /// The temporary directory for the working copy could not be created.
    #[error("cannot create working directory: {0}")]
    Scratch(#[source] std::io::Error),

    /// Manifest collection hit a fatal error.
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// A directory failed validation or apply.
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// The pull request conflicts with its base branch.
    #[error("pull request conflicts with base branch {base}")]
    Conflict {
        /// Base branch name.
        base: String,
    },

    /// The source-control system has not computed mergeability yet.
    #[error("mergeable state unknown; retry is not implemented")]
    MergeableStateUnknown,

    /// The orchestrator attempted an illegal lifecycle transition.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Errors from the deployment request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The worker has stopped; nothing will consume the request.
    #[error("deployment queue is closed")]
    Closed,

    /// The queue is at capacity (only from non-waiting enqueue).
    #[error("deployment queue is full")]
    Full,
}

/// Errors raising a deployment pull request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The scratch directory could not be created.
    #[error("cannot create working directory: {0}")]
    Scratch(#[source] std::io::Error),

    /// A git step failed.
    #[error(transparent)]
    VersionControl(#[from] VersionControlError),

    /// Copying the manifests into the working copy failed.
    #[error("cannot copy {path}: {source}")]
    Copy {
        /// Path being copied.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest directory does not exist or is not a directory.
    #[error("manifest directory {0} is not a directory")]
    ManifestDir(PathBuf),

    /// Opening the pull request or labelling it failed.
    #[error(transparent)]
    SourceControl(#[from] SourceControlError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_failure_message_includes_exit_code() {
        let err = VersionControlError::Failed {
            command: "diff".into(),
            exit_code: Some(128),
            stderr: "bad revision".into(),
        };
        assert_eq!(err.to_string(), "git diff failed (exit code 128): bad revision");
    }

    #[test]
    fn apply_error_names_the_directory() {
        let err = ApplyError {
            namespace: Namespace::new("app2").unwrap(),
            detail: "validation failed (exit code 1)".into(),
            output: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "deployment of app2 failed: validation failed (exit code 1)"
        );
    }
}
