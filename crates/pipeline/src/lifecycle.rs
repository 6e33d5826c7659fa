//! Per-request lifecycle state machine.
//!
//! ```text
//! Pending → MasterMergeCheck → Abandoned
//!                            → Failed
//!                            → Walking → Applying → Failed
//!                                                 → Succeeded → Merging → CleaningUp → Done
//! ```
//!
//! `Walking` may also fall through to `Failed`. No state is ever revisited;
//! [`Lifecycle::advance`] rejects any transition not drawn above.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a deployment request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Pending status being reported.
    Pending,
    /// Checking whether the base branch must be merged into the head first.
    MasterMergeCheck,
    /// Superseded by a base-branch merge commit. Terminal.
    Abandoned,
    /// Cloning, diffing and collecting manifests.
    Walking,
    /// Pushing bundles through the apply gate.
    Applying,
    /// All bundles applied; success being reported.
    Succeeded,
    /// Merging the pull request.
    Merging,
    /// Deleting the head branch.
    CleaningUp,
    /// Finished. Terminal.
    Done,
    /// Stopped after reporting an error. Terminal.
    Failed,
}

impl LifecycleState {
    /// Returns `true` for states a request never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Abandoned | Self::Done | Self::Failed)
    }

    /// Returns `true` if the state machine allows moving from `self` to `next`.
    pub fn can_advance_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Pending, MasterMergeCheck)
                | (MasterMergeCheck, Abandoned | Walking | Failed)
                | (Walking, Applying | Failed)
                | (Applying, Succeeded | Failed)
                | (Succeeded, Merging)
                | (Merging, CleaningUp)
                | (CleaningUp, Done)
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::MasterMergeCheck => "master_merge_check",
            Self::Abandoned => "abandoned",
            Self::Walking => "walking",
            Self::Applying => "applying",
            Self::Succeeded => "succeeded",
            Self::Merging => "merging",
            Self::CleaningUp => "cleaning_up",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An attempted transition the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal lifecycle transition {from} -> {to}")]
pub struct LifecycleError {
    /// State the request was in.
    pub from: LifecycleState,
    /// State it tried to enter.
    pub to: LifecycleState,
}

/// Tracks the states one request has passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    history: Vec<LifecycleState>,
}

impl Lifecycle {
    /// Starts a new lifecycle in [`LifecycleState::Pending`].
    pub fn new() -> Self {
        Self {
            history: vec![LifecycleState::Pending],
        }
    }

    /// Current state.
    pub fn current(&self) -> LifecycleState {
        // history is never empty: new() seeds it and advance() only pushes.
        self.history
            .last()
            .copied()
            .unwrap_or(LifecycleState::Pending)
    }

    /// Every state entered so far, oldest first.
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// Moves to `next`.
    pub fn advance(&mut self, next: LifecycleState) -> Result<(), LifecycleError> {
        let from = self.current();
        if !from.can_advance_to(next) {
            return Err(LifecycleError { from, to: next });
        }
        tracing::debug!(%from, to = %next, "lifecycle transition");
        self.history.push(next);
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
