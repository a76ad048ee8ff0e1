#![deny(missing_docs)]

//! # sambaza-api — HTTP Ingress for the SambazaPay Gateway
//!
//! Assembles the gateway's HTTP surface into a single Axum application.
//!
//! ## API Surface
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /stk-push` | initiate a top-up (rate-limited, 20/min/IP) |
//! | `POST /stk-callback` | payment result from the rail (100/min/IP) |
//! | `POST /daraja-reversal-result` | reversal verdict from the rail |
//! | `POST /daraja-reversal-timeout` | reversal expired in the rail queue |
//! | `GET /transaction-status/{id}` | lifecycle state of a transaction |
//! | `GET /api/airtime-bonuses/current` | current bonus percentages |
//! | `POST /api/airtime-bonuses/update` | change bonus percentages |
//! | `GET /ping`, `GET /` | liveness |
//!
//! Callback routes always answer 200 with `ResultCode: 0`; see
//! [`routes::callbacks`].

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::extract::Extension;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};
use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let push_limiter = RateLimiter::new(RateLimitConfig::initiation());
    let callback_limiter = RateLimiter::new(RateLimitConfig::callback());

    // The two rate-limited routes carry their own limiter instances; the
    // shared middleware picks whichever is in scope.
    let push = Router::new()
        .route("/stk-push", post(routes::topup::stk_push))
        .layer(from_fn(rate_limit_middleware))
        .layer(Extension(push_limiter));

    let callback = Router::new()
        .route("/stk-callback", post(routes::callbacks::stk_callback))
        .layer(from_fn(rate_limit_middleware))
        .layer(Extension(callback_limiter));

    Router::new()
        .route("/", get(routes::health))
        .route("/ping", get(routes::ping))
        .route(
            "/transaction-status/{id}",
            get(routes::topup::transaction_status),
        )
        .route(
            "/daraja-reversal-result",
            post(routes::callbacks::reversal_result),
        )
        .route(
            "/daraja-reversal-timeout",
            post(routes::callbacks::reversal_timeout),
        )
        .merge(routes::bonuses::router())
        .merge(push)
        .merge(callback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
