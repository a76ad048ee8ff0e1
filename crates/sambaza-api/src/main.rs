//! # sambaza-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the SambazaPay gateway. Binds to a
//! configurable port (default 8080).

use std::sync::Arc;

use sambaza_airtime::{Aggregator, AirtimeDispatch, DealerDirect};
use sambaza_api::config::GatewayConfig;
use sambaza_api::state::AppState;
use sambaza_daraja::DarajaClient;
use sambaza_engine::{AnalyticsNotifier, Engine, PaymentRail};
use sambaza_store::{MemStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env().map_err(|e| {
        tracing::error!("configuration error: {e}");
        e
    })?;

    // Durable store, or the in-memory twin for local development.
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = sambaza_store::pg::init_pool(url).await.map_err(|e| {
                tracing::error!("database initialization failed: {e}");
                e
            })?;
            let pg = PgStore::new(pool);
            pg.migrate().await.map_err(|e| {
                tracing::error!("schema migration failed: {e}");
                e
            })?;
            tracing::info!("connected to Postgres");
            Arc::new(pg)
        }
        None => {
            tracing::warn!(
                "DATABASE_URL is not set; using the in-memory store. \
                 Records will not survive a restart."
            );
            Arc::new(MemStore::new())
        }
    };

    let rail: Arc<dyn PaymentRail> = Arc::new(DarajaClient::new(config.daraja.clone())?);
    let dealer: Arc<dyn AirtimeDispatch> = Arc::new(DealerDirect::new(
        config.dealer.clone(),
        Arc::clone(&store),
    )?);
    let aggregator: Arc<dyn AirtimeDispatch> = Arc::new(Aggregator::new(config.aggregator.clone())?);

    let analytics = match &config.analytics_url {
        Some(url) => {
            tracing::info!("analytics notifications enabled");
            Some(AnalyticsNotifier::new(url.clone())?)
        }
        None => None,
    };

    let engine = Engine::new(store, rail, dealer, aggregator, analytics);
    let app = sambaza_api::app(AppState::new(engine))
        .into_make_service_with_connect_info::<std::net::SocketAddr>();

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("SambazaPay gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
