#![deny(missing_docs)]

//! # sambaza-daraja — M-Pesa Daraja Client
//!
//! Typed access to the three payment-rail operations the gateway uses:
//!
//! - **STK push** (`/mpesa/stkpush/v1/processrequest`) — ask the payer's
//!   phone to confirm a charge. The rail answers with a
//!   `CheckoutRequestID`, which becomes the canonical transaction key.
//! - **Transaction reversal** (`/mpesa/reversal/v1/request`) — refund a
//!   collected payment, authenticated with an RSA-encrypted security
//!   credential derived from the rail's public certificate.
//! - **Callback decoding** — the payment-result, reversal-result, and
//!   reversal-timeout payloads the rail posts back, including the
//!   name-keyed metadata array of the payment callback.
//!
//! OAuth tokens are cached inside the client until shortly before their
//! advertised expiry. The client is `Clone` and shares its cache.

pub mod auth;
pub mod callback;
pub mod config;
pub mod error;
pub mod reversal;
pub mod stk;

pub use auth::timestamp_and_password;
pub use callback::{CallbackMetadata, ReversalOutcome, StkCallback};
pub use config::DarajaConfig;
pub use error::DarajaError;
pub use reversal::{ReversalAccepted, SecurityCredential};
pub use stk::StkPushAccepted;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::auth::fetch_token;

/// Seconds subtracted from the advertised token lifetime before refresh.
const TOKEN_SAFETY_MARGIN_SECS: u64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Client for the Daraja payment rail.
///
/// Holds the HTTP client, configuration, the security credential prepared
/// at startup, and the OAuth token cache.
#[derive(Debug, Clone)]
pub struct DarajaClient {
    http: reqwest::Client,
    config: DarajaConfig,
    credential: SecurityCredential,
    // Single-flight: a refresh holds the lock until the new token lands,
    // so concurrent callers wait instead of stampeding the grant endpoint.
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl DarajaClient {
    /// Build a client, loading the reversal certificate from disk once.
    pub fn new(config: DarajaConfig) -> Result<Self, DarajaError> {
        let credential = SecurityCredential::from_certificate_file(
            &config.cert_path,
            &config.initiator_password,
        )?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DarajaError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            config,
            credential,
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// A bearer token, from cache or freshly fetched.
    async fn bearer_token(&self) -> Result<String, DarajaError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }
        let fetched = fetch_token(&self.http, &self.config).await?;
        let lifetime = fetched
            .expires_in_secs
            .saturating_sub(TOKEN_SAFETY_MARGIN_SECS)
            .max(1);
        let token = fetched.access_token;
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(token)
    }
}
