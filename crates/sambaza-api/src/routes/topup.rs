//! # Top-Up Endpoints
//!
//! Initiation and status polling — the two endpoints the portal talks to.

use axum::extract::{Path, State};
use axum::Json;

use sambaza_core::CheckoutRequestId;
use sambaza_engine::InitiationRequest;

use crate::error::AppError;
use crate::state::AppState;

/// `POST /stk-push` — validate and push a top-up charge to the payer.
///
/// Returns `{success, message, checkoutRequestID}` on acceptance. The
/// outcome of the payment itself arrives later via the rail's callback.
pub async fn stk_push(
    State(state): State<AppState>,
    Json(request): Json<InitiationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let accepted = state.engine.handle_initiation(request).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": accepted
            .customer_message
            .unwrap_or_else(|| "Payment request sent. Enter your M-Pesa PIN.".to_string()),
        "checkoutRequestID": accepted.checkout_request_id,
    })))
}

/// `GET /transaction-status/{id}` — the current engine state of a
/// transaction, as recorded in the store.
pub async fn transaction_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<sambaza_engine::StatusView>, AppError> {
    let view = state
        .engine
        .transaction_status(&CheckoutRequestId::new(id))
        .await?;
    Ok(Json(view))
}
