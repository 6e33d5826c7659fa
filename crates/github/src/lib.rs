//! GitHub infrastructure adapter.
//!
//! Implements [`pipeline::SourceControl`] and
//! [`pipeline::SourceControlProvider`] against the GitHub REST v3 API (public
//! and Enterprise) using `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. HTTP details
//! (authentication headers, status codes, payload shapes) stay here; the
//! [`pipeline`] crate only sees typed results and [`pipeline::SourceControlError`].

pub mod api_root;
pub mod client;
pub mod provider;

pub use api_root::{api_root, build_clone_url, ApiRootError, PUBLIC_API_ROOT};
pub use client::GitHubClient;
pub use provider::GitHubProvider;
