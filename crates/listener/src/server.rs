//! The webhook HTTP server.

use std::future::Future;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use pipeline::{AccessToken, DeploymentQueue};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};

use crate::{WebhookError, WebhookEvent, WebhookSecret, SIGNATURE_HEADER};

/// Port the agent listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 3016;

/// Route webhook deliveries are posted to unless configured otherwise.
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhooks";

const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";

/// Shared state of the webhook routes.
#[derive(Debug, Clone)]
pub struct WebhookState {
    /// Where accepted requests go.
    pub queue: DeploymentQueue,
    /// Secret deliveries are signed with.
    pub secret: WebhookSecret,
    /// Token attached to every request for source-control calls.
    pub token: AccessToken,
}

/// Builds the router: `POST <path>` for deliveries, `GET /healthz` for probes.
pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(receive))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "listening for webhooks");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn healthz() -> &'static str {
    "ok"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[instrument(
    skip_all,
    fields(
        event = header(&headers, EVENT_HEADER).unwrap_or_default(),
        delivery = header(&headers, DELIVERY_HEADER).unwrap_or_default(),
    )
)]
async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    state
        .secret
        .verify(&body, header(&headers, SIGNATURE_HEADER))?;
    let event_name = header(&headers, EVENT_HEADER).ok_or(WebhookError::MissingEvent)?;

    match WebhookEvent::parse(event_name, &body)? {
        WebhookEvent::PullRequest(event) if event.action.triggers_deployment() => {
            let request = event.to_request(&state.token)?;
            state
                .queue
                .enqueue(request)
                .await
                .map_err(|_| WebhookError::QueueClosed)?;
            Ok(StatusCode::ACCEPTED)
        }
        WebhookEvent::PullRequest(event) => {
            debug!(action = ?event.action, "pull request action ignored");
            Ok(StatusCode::NO_CONTENT)
        }
        WebhookEvent::Ping => {
            info!("ping received");
            Ok(StatusCode::NO_CONTENT)
        }
        WebhookEvent::Unsupported(name) => {
            debug!(event = %name, "event ignored");
            Ok(StatusCode::NO_CONTENT)
        }
    }
}
