//! Change-scope resolution: which top-level directories a pull request touches.

use std::path::Path;

use tracing::instrument;

use crate::{ChangeSet, CommitSha, DeployError, VersionControl};

/// Returns the top-level directories changed between the working tree of
/// `working_copy` and `base`.
///
/// A diff failure is fatal for the request: a partial scope would deploy
/// some directories and silently skip others.
#[instrument(skip_all, fields(base = %base))]
pub async fn changed_directories(
    vcs: &dyn VersionControl,
    working_copy: &Path,
    base: &CommitSha,
) -> Result<ChangeSet, DeployError> {
    let names = vcs
        .diff_names(working_copy, base)
        .await
        .map_err(DeployError::Diff)?;
    let changes = ChangeSet::from_paths(names.split('\n'));
    tracing::info!(directories = changes.len(), "resolved change scope");
    Ok(changes)
}
