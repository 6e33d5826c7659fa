//! The cluster-apply executable.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use async_trait::async_trait;
use pipeline::{ApplyMode, ClusterApplier, ClusterError, CommandOutput, Namespace};
use tracing::{info, instrument};

use crate::command::{run_combined, RunError};

/// Drives `kubectl apply`, feeding manifests on stdin.
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: PathBuf,
}

impl Kubectl {
    /// Uses `program` instead of `kubectl` from `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The executable invoked.
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Command-line arguments for one pass over `namespace`.
    pub fn arguments(namespace: &Namespace, mode: ApplyMode) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--namespace".into(),
            namespace.as_str().into(),
            "apply".into(),
        ];
        if mode == ApplyMode::Validate {
            args.push("--dry-run=server".into());
        }
        args.push("-f".into());
        args.push("-".into());
        args
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl ClusterApplier for Kubectl {
    #[instrument(skip_all, fields(directory = %namespace, %mode))]
    async fn apply(
        &self,
        namespace: &Namespace,
        manifests: &str,
        mode: ApplyMode,
    ) -> Result<CommandOutput, ClusterError> {
        let program = self.program.display().to_string();
        info!(bytes = manifests.len(), "running {program}");
        run_combined(
            OsStr::new(&self.program),
            Self::arguments(namespace, mode),
            None,
            Some(manifests.as_bytes()),
        )
        .await
        .map_err(|err| match err {
            RunError::Spawn(source) => ClusterError::Spawn { program, source },
            RunError::Io(source) => ClusterError::Io { program, source },
        })
    }
}
