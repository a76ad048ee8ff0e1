//! Route handlers, grouped by concern.

pub mod bonuses;
pub mod callbacks;
pub mod topup;

use axum::response::IntoResponse;

/// `GET /` — health string.
pub async fn health() -> impl IntoResponse {
    concat!("SambazaPay gateway ", env!("CARGO_PKG_VERSION"), " is up")
}

/// `GET /ping` — liveness.
pub async fn ping() -> &'static str {
    "pong"
}
