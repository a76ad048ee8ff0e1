//! # Gateway Configuration
//!
//! Everything comes from the environment. Required variables produce a
//! typed error naming the variable; optional ones fall back to defaults.
//! Secrets never appear in `Debug` output — the client configs redact
//! their own credential fields.

use url::Url;

use sambaza_airtime::{AggregatorConfig, DealerConfig};
use sambaza_core::{Msisdn, MsisdnError};
use sambaza_daraja::DarajaConfig;

/// Default payment-rail base URL (production).
const DEFAULT_DARAJA_BASE: &str = "https://api.safaricom.co.ke";

/// Default outbound HTTP timeout, seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// The port to listen on.
    pub port: u16,
    /// Postgres connection string; absent means in-memory dev mode.
    pub database_url: Option<String>,
    /// Analytics service endpoint, if notifications are wanted.
    pub analytics_url: Option<Url>,
    /// Payment rail client configuration.
    pub daraja: DarajaConfig,
    /// Dealer-direct provider configuration.
    pub dealer: DealerConfig,
    /// Aggregator provider configuration.
    pub aggregator: AggregatorConfig,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset.
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// A URL-valued variable did not parse.
    #[error("invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),

    /// A phone-valued variable did not parse.
    #[error("invalid MSISDN in {0}: {1}")]
    InvalidMsisdn(&'static str, MsisdnError),
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::Missing(var))
}

fn required_url(var: &'static str) -> Result<Url, ConfigError> {
    let raw = required(var)?;
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var, e.to_string()))
}

fn optional_url(var: &'static str) -> Result<Option<Url>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => Url::parse(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidUrl(var, e.to_string())),
        Err(_) => Ok(None),
    }
}

fn url_or(var: &'static str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var, e.to_string()))
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `DARAJA_CONSUMER_KEY`, `DARAJA_CONSUMER_SECRET`,
    /// `DARAJA_SHORT_CODE`, `DARAJA_PASSKEY`, `DARAJA_CALLBACK_BASE_URL`,
    /// `DARAJA_INITIATOR_NAME`, `DARAJA_INITIATOR_PASSWORD`,
    /// `DARAJA_CERT_PATH`, `DEALER_API_KEY`, `DEALER_API_SECRET`,
    /// `DEALER_GRANT_URL`, `DEALER_AIRTIME_URL`, `DEALER_SENDER_MSISDN`,
    /// `AT_API_KEY`, `AT_USERNAME`, `AT_AIRTIME_URL`.
    ///
    /// Optional: `DARAJA_BASE_URL` (production default),
    /// `DARAJA_REVERSAL_RESULT_URL` / `DARAJA_REVERSAL_TIMEOUT_URL`
    /// (derived from the callback base by default), `DATABASE_URL`,
    /// `ANALYTICS_URL`, `PORT` (8080), `HTTP_TIMEOUT_SECS` (30).
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let callback_base = required_url("DARAJA_CALLBACK_BASE_URL")?;
        let join = |base: &Url, path: &str| -> Result<Url, ConfigError> {
            base.join(path)
                .map_err(|e| ConfigError::InvalidUrl("DARAJA_CALLBACK_BASE_URL", e.to_string()))
        };

        let reversal_result_url = match optional_url("DARAJA_REVERSAL_RESULT_URL")? {
            Some(url) => url,
            None => join(&callback_base, "daraja-reversal-result")?,
        };
        let reversal_timeout_url = match optional_url("DARAJA_REVERSAL_TIMEOUT_URL")? {
            Some(url) => url,
            None => join(&callback_base, "daraja-reversal-timeout")?,
        };

        let daraja = DarajaConfig {
            base_url: url_or("DARAJA_BASE_URL", DEFAULT_DARAJA_BASE)?,
            consumer_key: required("DARAJA_CONSUMER_KEY")?,
            consumer_secret: required("DARAJA_CONSUMER_SECRET")?,
            short_code: required("DARAJA_SHORT_CODE")?,
            passkey: required("DARAJA_PASSKEY")?,
            callback_url: join(&callback_base, "stk-callback")?,
            initiator_name: required("DARAJA_INITIATOR_NAME")?,
            initiator_password: required("DARAJA_INITIATOR_PASSWORD")?,
            cert_path: required("DARAJA_CERT_PATH")?,
            reversal_result_url,
            reversal_timeout_url,
            timeout_secs,
        };

        let sender_raw = required("DEALER_SENDER_MSISDN")?;
        let dealer = DealerConfig {
            grant_url: required_url("DEALER_GRANT_URL")?,
            airtime_url: required_url("DEALER_AIRTIME_URL")?,
            api_key: required("DEALER_API_KEY")?,
            api_secret: required("DEALER_API_SECRET")?,
            sender_msisdn: Msisdn::parse(&sender_raw)
                .map_err(|e| ConfigError::InvalidMsisdn("DEALER_SENDER_MSISDN", e))?,
            timeout_secs,
        };

        let aggregator = AggregatorConfig {
            airtime_url: required_url("AT_AIRTIME_URL")?,
            username: required("AT_USERNAME")?,
            api_key: required("AT_API_KEY")?,
            timeout_secs,
        };

        Ok(Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url: std::env::var("DATABASE_URL").ok(),
            analytics_url: optional_url("ANALYTICS_URL")?,
            daraja,
            dealer,
            aggregator,
        })
    }
}
