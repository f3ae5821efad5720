//! Intent handling for `POST /message`
//!
//! Parses the intent, runs it through the dispatcher and returns the
//! dispatcher's response as JSON. Intent failures are reported inside the
//! response body with a 200 status; only unparseable requests get a 400.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use insight_api::{Dispatcher, Intent};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};

/// Shared state passed to the message handler via axum State extractor
#[derive(Clone)]
pub struct MessageState {
    pub dispatcher: Dispatcher,
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
}

/// JSON error body: {"error":{"type":"bridge_error","message":"...","request_id":"req_..."}}
fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": "bridge_error",
            "message": message,
            "request_id": request_id,
        }
    });
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Decrements the in-flight gauge when the request finishes, even on cancel.
struct InFlight(Arc<AtomicU64>);

impl InFlight {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Handle one intent from the popup.
pub async fn handle_message(state: &MessageState, body: Bytes, request_id: String) -> Response {
    state.requests_total.fetch_add(1, Ordering::Relaxed);
    let _in_flight = InFlight::enter(&state.in_flight);

    let intent: Intent = match serde_json::from_slice(&body) {
        Ok(intent) => intent,
        Err(e) => {
            state.errors_total.fetch_add(1, Ordering::Relaxed);
            warn!(request_id = %request_id, error = %e, "rejected malformed intent");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid intent: {e}"),
                &request_id,
            );
        }
    };

    let action = intent.action();
    let span = info_span!("intent", request_id = %request_id, action);
    async move {
        let started = Instant::now();
        let response = state.dispatcher.dispatch(intent).await;
        let elapsed = started.elapsed();

        let failed = response.error().is_some();
        if let Some(error) = response.error() {
            state.errors_total.fetch_add(1, Ordering::Relaxed);
            warn!(error, elapsed_ms = elapsed.as_millis() as u64, "intent failed");
        } else {
            info!(elapsed_ms = elapsed.as_millis() as u64, "intent handled");
        }
        crate::metrics::record_intent(action, failed, elapsed.as_secs_f64());

        (StatusCode::OK, axum::Json(response)).into_response()
    }
    .instrument(span)
    .await
}
