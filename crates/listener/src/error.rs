//! Webhook rejection reasons and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Why a delivery was rejected.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The signature header is absent.
    #[error("missing signature header")]
    MissingSignature,

    /// The signature header does not match the body.
    #[error("signature mismatch")]
    InvalidSignature,

    /// The event-name header is absent.
    #[error("missing event header")]
    MissingEvent,

    /// The body is not the JSON the event promises.
    #[error("malformed {event} payload: {source}")]
    Malformed {
        /// Event name from the delivery headers.
        event: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The payload decoded but a required value is empty.
    #[error("invalid payload: empty {0}")]
    InvalidPayload(&'static str),

    /// The deployment queue has shut down.
    #[error("deployment queue closed")]
    QueueClosed,
}

impl WebhookError {
    /// HTTP status reported to the sender.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::MissingEvent | Self::Malformed { .. } | Self::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self, "webhook rejected");
        (status, self.to_string()).into_response()
    }
}
