//! # Payment Rail Callbacks
//!
//! The rail's asynchronous answers: payment result, reversal result,
//! reversal queue timeout.
//!
//! Contract: these endpoints return HTTP 200 with `ResultCode: 0` no
//! matter what — a non-2xx (or a failing `ResultCode`) makes the rail
//! retry, and retried callbacks are how duplicate state transitions get
//! manufactured. Processing happens in a background task so the rail gets
//! its acknowledgment inside its own timeout window even when a dispatch
//! chain runs long; inner failures land in the error store, not in the
//! response.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use sambaza_core::{Fault, FaultKind};
use sambaza_daraja::{ReversalOutcome, StkCallback};

use crate::state::AppState;

fn ack() -> impl IntoResponse {
    Json(serde_json::json!({
        "ResultCode": 0,
        "ResultDesc": "Accepted",
    }))
}

async fn log_undecodable(state: &AppState, endpoint: &str, error: impl std::fmt::Display) {
    tracing::warn!(endpoint, "undecodable callback payload: {error}");
    if let Err(e) = state
        .store
        .log_fault(Fault::new(
            FaultKind::StkCallbackError,
            serde_json::json!({"endpoint": endpoint, "error": error.to_string()}),
        ))
        .await
    {
        tracing::error!("failed to write error record: {e}");
    }
}

/// `POST /stk-callback` — the payment result.
pub async fn stk_callback(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let decoded = serde_json::from_slice::<serde_json::Value>(&body)
        .and_then(|raw| StkCallback::from_json(&raw));
    match decoded {
        Ok(callback) => {
            let engine = state.engine.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.handle_payment_callback(callback).await {
                    tracing::error!("payment callback processing failed: {e}");
                }
            });
        }
        Err(e) => log_undecodable(&state, "stk-callback", e).await,
    }
    ack()
}

/// `POST /daraja-reversal-result` — the reversal verdict.
pub async fn reversal_result(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let decoded = serde_json::from_slice::<serde_json::Value>(&body)
        .and_then(|raw| ReversalOutcome::from_json(&raw));
    match decoded {
        Ok(outcome) => {
            let engine = state.engine.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.handle_reversal_result(outcome).await {
                    tracing::error!("reversal result processing failed: {e}");
                }
            });
        }
        Err(e) => log_undecodable(&state, "daraja-reversal-result", e).await,
    }
    ack()
}

/// `POST /daraja-reversal-timeout` — the reversal expired in the rail's
/// queue.
pub async fn reversal_timeout(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let decoded = serde_json::from_slice::<serde_json::Value>(&body)
        .and_then(|raw| ReversalOutcome::from_json(&raw));
    match decoded {
        Ok(outcome) => {
            let engine = state.engine.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.handle_reversal_timeout(outcome).await {
                    tracing::error!("reversal timeout processing failed: {e}");
                }
            });
        }
        Err(e) => log_undecodable(&state, "daraja-reversal-timeout", e).await,
    }
    ack()
}
