//! Deployment trigger event source.
//!
//! Binds an HTTP server that receives GitHub webhook deliveries, verifies
//! their HMAC-SHA256 signature and turns qualifying pull-request events into
//! [`pipeline::DeploymentRequest`]s on the [`pipeline::DeploymentQueue`].
//!
//! | Delivery | Response |
//! |----------|----------|
//! | `pull_request` opened / reopened / synchronize | 202, request enqueued |
//! | other pull-request actions, `ping`, other events | 204 |
//! | missing or wrong signature | 401 |
//! | missing event header, malformed JSON | 400 |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details and payload deserialization live
//! here. The [`pipeline`] crate sees only the requests this crate enqueues.

pub mod error;
pub mod event;
pub mod server;
pub mod signature;

pub use error::WebhookError;
pub use event::{PullRequestAction, PullRequestEvent, WebhookEvent};
pub use server::{router, serve, WebhookState, DEFAULT_PORT, DEFAULT_WEBHOOK_PATH};
pub use signature::{WebhookSecret, SIGNATURE_HEADER};
