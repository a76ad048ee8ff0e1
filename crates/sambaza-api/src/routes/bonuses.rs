//! # Bonus Administration
//!
//! Reads and writes the per-telco bonus percentages. Every change is
//! audited: the store writes a history entry per value that actually
//! moved, carrying the actor.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;

use sambaza_core::BonusSettings;

use crate::error::AppError;
use crate::state::AppState;

/// The bonus admin routes under `/api/airtime-bonuses`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/airtime-bonuses/current", get(current))
        .route("/api/airtime-bonuses/update", post(update))
        .route("/api/airtime-bonuses/history", get(history))
}

/// `GET /api/airtime-bonuses/current`.
async fn current(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let settings = state
        .store
        .bonus_settings()
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(serde_json::json!({
        "safaricomPercentage": settings.safaricom_pct,
        "africastalkingPercentage": settings.africastalking_pct,
    })))
}

/// `GET /api/airtime-bonuses/history` — recent changes, newest first.
async fn history(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let entries = state
        .store
        .bonus_history(50)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    let entries: Vec<serde_json::Value> = entries
        .into_iter()
        .map(|entry| {
            serde_json::json!({
                "telco": entry.telco,
                "oldPercentage": entry.old_pct,
                "newPercentage": entry.new_pct,
                "actor": entry.actor,
                "changedAt": entry.created_at,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({"entries": entries})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    safaricom_percentage: Decimal,
    africastalking_percentage: Decimal,
    actor: String,
}

/// `POST /api/airtime-bonuses/update`.
async fn update(
    State(state): State<AppState>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.safaricom_percentage < Decimal::ZERO || body.africastalking_percentage < Decimal::ZERO
    {
        return Err(AppError::Validation(
            "bonus percentages must be non-negative".into(),
        ));
    }
    if body.actor.trim().is_empty() {
        return Err(AppError::Validation("actor is required".into()));
    }

    let settings = state
        .store
        .update_bonus_settings(
            BonusSettings {
                safaricom_pct: body.safaricom_percentage,
                africastalking_pct: body.africastalking_percentage,
            },
            body.actor.trim(),
        )
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "safaricomPercentage": settings.safaricom_pct,
        "africastalkingPercentage": settings.africastalking_pct,
    })))
}
