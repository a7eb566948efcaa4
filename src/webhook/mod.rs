pub mod payload;
pub mod signature;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};

use crate::handler::EventHandler;
use crate::pr::PullRequestEvent;
use payload::PullRequestPayload;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";

/// Process-wide state, built once at startup and shared by every delivery.
pub struct AppState {
    pub handler: Arc<EventHandler>,
    pub webhook_secret: SecretString,
}

#[derive(Debug, Error)]
pub enum WebhookDispatchError {
    #[error("Missing X-Hub-Signature-256 header")]
    MissingSignature,

    #[error("Webhook signature does not match payload")]
    InvalidSignature,

    #[error("Missing X-GitHub-Event header")]
    MissingEvent,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

impl WebhookDispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookDispatchError::MissingSignature | WebhookDispatchError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            WebhookDispatchError::MissingEvent | WebhookDispatchError::MalformedPayload(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

/// Every rejected delivery is logged here and nowhere else.
impl IntoResponse for WebhookDispatchError {
    fn into_response(self) -> Response {
        error!(error = %self, "error processing webhook delivery");
        (self.status_code(), self.to_string()).into_response()
    }
}

/// What the receiver did with a verified delivery.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A review task was spawned for this pull request.
    Spawned(PullRequestEvent),
    Ignored,
}

pub fn router(state: Arc<AppState>, webhook_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(webhook_path, post(receive))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookDispatchError> {
    let signature_header =
        header(&headers, SIGNATURE_HEADER).ok_or(WebhookDispatchError::MissingSignature)?;
    signature::verify(
        state.webhook_secret.expose_secret().as_bytes(),
        &body,
        signature_header,
    )?;

    let event_name = header(&headers, EVENT_HEADER).ok_or(WebhookDispatchError::MissingEvent)?;
    let delivery = header(&headers, DELIVERY_HEADER).unwrap_or("unknown");

    match dispatch(&state, event_name, delivery, &body)? {
        Dispatch::Spawned(event) => {
            debug!(pr = %event, "review task spawned");
            Ok(StatusCode::ACCEPTED)
        }
        Dispatch::Ignored => Ok(StatusCode::OK),
    }
}

/// Route a verified delivery. Only `pull_request` events with action
/// `opened` start a review; the review runs on its own task so the
/// reply doesn't wait on GitHub or the model.
pub fn dispatch(
    state: &AppState,
    event_name: &str,
    delivery: &str,
    body: &[u8],
) -> Result<Dispatch, WebhookDispatchError> {
    if event_name != "pull_request" {
        debug!(event = event_name, delivery, "ignoring event");
        return Ok(Dispatch::Ignored);
    }

    let payload: PullRequestPayload = serde_json::from_slice(body)?;
    if payload.action != "opened" {
        debug!(action = %payload.action, delivery, "ignoring pull_request action");
        return Ok(Dispatch::Ignored);
    }

    let event = payload.into_event();
    info!(pr = %event, delivery, "dispatching pull_request.opened");

    let handler = Arc::clone(&state.handler);
    let task_event = event.clone();
    tokio::spawn(
        async move {
            handler.on_pull_request_opened(&task_event).await;
        }
        .instrument(info_span!("delivery", id = %delivery)),
    );

    Ok(Dispatch::Spawned(event))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::{pr_42, StubHost, CANNED_REVIEW, OPENED_DIFF};
    use crate::review::generator::tests::{response_with_text, StubGenerator};
    use crate::review::ReviewGenerator;
    use crate::webhook::signature::tests::sign;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "s3cret";
    const PATH: &str = "/api/webhook";

    fn opened_body(action: &str) -> String {
        serde_json::json!({
            "action": action,
            "number": 42,
            "pull_request": {"number": 42},
            "repository": {"name": "repo", "owner": {"login": "org"}},
            "installation": {"id": 7}
        })
        .to_string()
    }

    fn state(host: &Arc<StubHost>, generator: &Arc<StubGenerator>) -> Arc<AppState> {
        Arc::new(AppState {
            handler: Arc::new(EventHandler::new(
                host.clone(),
                ReviewGenerator::new(generator.clone()),
            )),
            webhook_secret: SecretString::from(SECRET.to_string()),
        })
    }

    fn fixtures() -> (Arc<StubHost>, Arc<StubGenerator>) {
        (
            Arc::new(StubHost::serving(OPENED_DIFF)),
            Arc::new(StubGenerator::replying(response_with_text(CANNED_REVIEW))),
        )
    }

    fn delivery(event: &str, body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(PATH)
            .header("content-type", "application/json")
            .header(EVENT_HEADER, event)
            .header(DELIVERY_HEADER, "72d3162e-cc78-11e3-81ab-4c9367dc0958");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn signed(event: &str, body: &str) -> Request<Body> {
        delivery(event, body, Some(sign(SECRET.as_bytes(), body.as_bytes())))
    }

    async fn wait_for_comments(host: &StubHost, expected: usize) {
        for _ in 0..100 {
            if host.posted().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} comments, got {}", host.posted().len());
    }

    #[tokio::test]
    async fn test_health() {
        let (host, generator) = fixtures();
        let response = router(state(&host, &generator), PATH)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_opened_delivery_is_reviewed() {
        let (host, generator) = fixtures();
        let response = router(state(&host, &generator), PATH)
            .oneshot(signed("pull_request", &opened_body("opened")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        wait_for_comments(&host, 1).await;
        assert_eq!(host.posted(), vec![(pr_42(), CANNED_REVIEW.to_string())]);
    }

    #[tokio::test]
    async fn test_redelivery_is_reviewed_again() {
        let (host, generator) = fixtures();
        let app = router(state(&host, &generator), PATH);
        let body = opened_body("opened");

        for _ in 0..2 {
            let response = app.clone().oneshot(signed("pull_request", &body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        wait_for_comments(&host, 2).await;
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_other_actions_and_events_are_ignored() {
        let (host, generator) = fixtures();
        let app = router(state(&host, &generator), PATH);

        let closed = app
            .clone()
            .oneshot(signed("pull_request", &opened_body("closed")))
            .await
            .unwrap();
        assert_eq!(closed.status(), StatusCode::OK);

        let ping = app
            .oneshot(signed("ping", r#"{"zen":"Keep it logically awesome.","hook_id":1}"#))
            .await
            .unwrap();
        assert_eq!(ping.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(host.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_unsigned_delivery_is_rejected() {
        let (host, generator) = fixtures();
        let response = router(state(&host, &generator), PATH)
            .oneshot(delivery("pull_request", &opened_body("opened"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let (host, generator) = fixtures();
        let body = opened_body("opened");
        let forged = sign(b"wrong-secret", body.as_bytes());
        let response = router(state(&host, &generator), PATH)
            .oneshot(delivery("pull_request", &body, Some(forged)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(host.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let (host, generator) = fixtures();
        let response = router(state(&host, &generator), PATH)
            .oneshot(signed("pull_request", r#"{"action":"opened"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dispatch_returns_event() {
        let (host, generator) = fixtures();
        let state = state(&host, &generator);
        let dispatched = dispatch(
            &state,
            "pull_request",
            "delivery-1",
            opened_body("opened").as_bytes(),
        )
        .unwrap();
        assert_eq!(dispatched, Dispatch::Spawned(pr_42()));
        wait_for_comments(&host, 1).await;
    }
}
