//! Process-backed implementations of the pipeline's version-control and
//! cluster ports.
//!
//! | Type | Port | Executable |
//! |------|------|------------|
//! | [`GitCli`] | [`pipeline::VersionControl`] | `git` |
//! | [`Kubectl`] | [`pipeline::ClusterApplier`] | `kubectl` |

pub mod command;
pub mod git;
pub mod kubectl;

pub use command::{run_combined, RunError};
pub use git::GitCli;
pub use kubectl::Kubectl;
