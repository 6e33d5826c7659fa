//! Status and comment reporting back to the pull request.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::{CommitSha, CommitState, Namespace, PullRequestNumber, SourceControl, SourceControlError};

/// Longest commit-status description the source-control API accepts.
pub const STATUS_DESCRIPTION_LIMIT: usize = 140;

/// Pushes lifecycle events to one pull request as a commit status on its head
/// revision plus a conversation comment.
pub struct StatusReporter {
    client: Arc<dyn SourceControl>,
    number: PullRequestNumber,
    sha: CommitSha,
    context: String,
}

impl StatusReporter {
    /// Creates a reporter for pull request `number`, attaching statuses to
    /// `sha` under `context`.
    pub fn new(
        client: Arc<dyn SourceControl>,
        number: PullRequestNumber,
        sha: CommitSha,
        context: impl Into<String>,
    ) -> Self {
        Self {
            client,
            number,
            sha,
            context: context.into(),
        }
    }

    /// Sets the commit status, then posts `comment`.
    pub async fn report(
        &self,
        state: CommitState,
        description: &str,
        comment: &str,
    ) -> Result<(), SourceControlError> {
        info!(%state, description, "reporting");
        self.client
            .create_status(
                &self.sha,
                state,
                &truncate_description(description),
                &self.context,
            )
            .await?;
        self.client.create_comment(self.number, comment).await
    }
}

/// Shortens `description` to [`STATUS_DESCRIPTION_LIMIT`] characters, ending
/// in `…` when cut.
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() <= STATUS_DESCRIPTION_LIMIT {
        return description.to_string();
    }
    let mut cut: String = description
        .chars()
        .take(STATUS_DESCRIPTION_LIMIT - 1)
        .collect();
    cut.push('…');
    cut
}

/// Renders per-directory output as a markdown list, directories in sorted
/// order, output lines indented by a tab.
pub fn format_results(results: &BTreeMap<Namespace, String>) -> String {
    let mut out = String::new();
    for (namespace, output) in results {
        out.push_str(&format!(
            "* {namespace}:\n\t{}\n\n",
            output.replace('\n', "\n\t")
        ));
    }
    out
}

/// Renders directory names as `[a b c]`.
pub fn namespace_list<'a>(namespaces: impl IntoIterator<Item = &'a Namespace>) -> String {
    let names: Vec<&str> = namespaces.into_iter().map(Namespace::as_str).collect();
    format!("[{}]", names.join(" "))
}
