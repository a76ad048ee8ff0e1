//! # Dealer-Direct Provider
//!
//! The home telco's first-party airtime API. Quirks the rest of the
//! gateway never sees:
//!
//! - amounts travel in minor units (cents);
//! - the service PIN is base64-encoded on every request and fetched from
//!   operator settings with a short TTL;
//! - the interesting facts — the transfer reference and the new dealer
//!   float balance — live inside a free-text description and come out
//!   with regexes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use sambaza_core::{to_minor_units, Carrier, Msisdn, ProviderKind};
use sambaza_store::Store;

use crate::cache::TtlCell;
use crate::error::AirtimeError;
use crate::{AirtimeDispatch, DispatchReceipt};

/// Seconds subtracted from the advertised token lifetime before refresh.
const TOKEN_SAFETY_MARGIN_SECS: u64 = 120;

/// Token lifetime assumed when the grant response does not advertise one.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// How long a fetched service PIN is trusted before re-reading settings.
const PIN_TTL: Duration = Duration::from_secs(10 * 60);

static TRANSFER_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"R\d{6}\.\d{4}\.\d{6}").expect("transfer ref pattern is valid")
});

static NEW_BALANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"New balance is Ksh\.?\s*([0-9,]+(?:\.[0-9]+)?)")
        .expect("balance pattern is valid")
});

/// Configuration for the dealer-direct provider.
#[derive(Clone)]
pub struct DealerConfig {
    /// Token grant endpoint.
    pub grant_url: Url,
    /// Airtime transfer endpoint.
    pub airtime_url: Url,
    /// HTTP Basic username for the grant.
    pub api_key: String,
    /// HTTP Basic password for the grant.
    pub api_secret: String,
    /// The dealer line airtime is sent from.
    pub sender_msisdn: Msisdn,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for DealerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DealerConfig")
            .field("grant_url", &self.grant_url)
            .field("airtime_url", &self.airtime_url)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("sender_msisdn", &self.sender_msisdn)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GrantResponse {
    access_token: String,
    expires_in: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    #[serde(rename = "senderMsisdn")]
    sender_msisdn: &'a str,
    /// Minor units — KES cents.
    amount: i64,
    #[serde(rename = "servicePin")]
    service_pin: String,
    #[serde(rename = "receiverMsisdn")]
    receiver_msisdn: &'a str,
}

/// What the dealer's free-text description yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescription {
    /// The dealer's transfer reference, when present.
    pub transfer_ref: Option<String>,
    /// The authoritative new dealer float balance, when present.
    pub new_balance: Option<Decimal>,
}

/// Extract the transfer reference and new balance from a description like
/// `R250101.0001.000001 New balance is Ksh. 4900.00`.
pub fn parse_description(description: &str) -> ParsedDescription {
    let transfer_ref = TRANSFER_REF
        .find(description)
        .map(|m| m.as_str().to_string());
    let new_balance = NEW_BALANCE
        .captures(description)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok());
    ParsedDescription {
        transfer_ref,
        new_balance,
    }
}

/// The dealer-direct [`AirtimeDispatch`] implementation.
pub struct DealerDirect {
    http: reqwest::Client,
    config: DealerConfig,
    store: Arc<dyn Store>,
    token: TtlCell<String>,
    pin: TtlCell<String>,
}

impl DealerDirect {
    /// Build the provider. The store supplies the service PIN.
    pub fn new(config: DealerConfig, store: Arc<dyn Store>) -> Result<Self, AirtimeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AirtimeError::Http {
                endpoint: "dealer_client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            config,
            store,
            token: TtlCell::new(),
            pin: TtlCell::new(),
        })
    }

    async fn bearer_token(&self) -> Result<String, AirtimeError> {
        self.token
            .get_or_fetch(|| async {
                let response = self
                    .http
                    .get(self.config.grant_url.clone())
                    .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
                    .send()
                    .await
                    .map_err(|e| AirtimeError::Http {
                        endpoint: "dealer/grant".into(),
                        source: e,
                    })?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AirtimeError::Api {
                        endpoint: "dealer/grant".into(),
                        status: status.as_u16(),
                        body,
                    });
                }
                let grant: GrantResponse =
                    response
                        .json()
                        .await
                        .map_err(|e| AirtimeError::Deserialization {
                            endpoint: "dealer/grant".into(),
                            source: e,
                        })?;
                // expires_in arrives as a number or a numeric string.
                let advertised = match &grant.expires_in {
                    Some(serde_json::Value::Number(n)) => {
                        n.as_u64().unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
                    }
                    Some(serde_json::Value::String(s)) => {
                        s.parse().unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
                    }
                    _ => DEFAULT_TOKEN_LIFETIME_SECS,
                };
                let ttl = advertised.saturating_sub(TOKEN_SAFETY_MARGIN_SECS).max(1);
                Ok((grant.access_token, Duration::from_secs(ttl)))
            })
            .await
    }

    async fn service_pin(&self) -> Result<String, AirtimeError> {
        self.pin
            .get_or_fetch(|| async {
                let pin = self
                    .store
                    .service_pin()
                    .await
                    .map_err(|e| AirtimeError::Credential(format!("PIN lookup failed: {e}")))?
                    .ok_or_else(|| {
                        AirtimeError::Credential("dealer service PIN is not configured".into())
                    })?;
                Ok((pin, PIN_TTL))
            })
            .await
    }
}

#[async_trait]
impl AirtimeDispatch for DealerDirect {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DealerDirect
    }

    async fn dispatch(
        &self,
        destination: &Msisdn,
        amount: Decimal,
        _carrier: Carrier,
    ) -> Result<DispatchReceipt, AirtimeError> {
        let token = self.bearer_token().await?;
        let pin = self.service_pin().await?;
        let payload = TransferRequest {
            sender_msisdn: self.config.sender_msisdn.dealer(),
            amount: to_minor_units(amount)?,
            service_pin: BASE64.encode(&pin),
            receiver_msisdn: destination.dealer(),
        };

        let response = self
            .http
            .post(self.config.airtime_url.clone())
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AirtimeError::Http {
                endpoint: "dealer/airtime".into(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            // A 401 means the cached token outlived its welcome; drop it
            // so the next attempt re-authenticates.
            if status.as_u16() == 401 {
                self.token.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AirtimeError::Api {
                endpoint: "dealer/airtime".into(),
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| AirtimeError::Deserialization {
                    endpoint: "dealer/airtime".into(),
                    source: e,
                })?;

        if raw["responseStatus"] != "200" {
            return Err(AirtimeError::Refused {
                provider: ProviderKind::DealerDirect,
                detail: raw,
            });
        }

        let description = raw["responseDesc"].as_str().unwrap_or_default();
        let parsed = parse_description(description);
        tracing::debug!(
            receiver = destination.national(),
            transfer_ref = parsed.transfer_ref.as_deref().unwrap_or("-"),
            "dealer transfer accepted"
        );
        Ok(DispatchReceipt {
            provider: ProviderKind::DealerDirect,
            provider_ref: parsed.transfer_ref,
            reported_balance: parsed.new_balance,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_ref_and_balance_from_a_full_description() {
        let parsed = parse_description(
            "You have successfully sent Ksh.100.00 to 0712345678. \
             R250101.0001.000001 New balance is Ksh. 4900.00",
        );
        assert_eq!(parsed.transfer_ref.as_deref(), Some("R250101.0001.000001"));
        assert_eq!(parsed.new_balance, Some(dec!(4900.00)));
    }

    #[test]
    fn parses_balances_with_thousands_separators() {
        let parsed = parse_description("R250101.0002.000002 New balance is Ksh. 1,204,900.50");
        assert_eq!(parsed.new_balance, Some(dec!(1204900.50)));
    }

    #[test]
    fn tolerates_a_description_with_neither_fact() {
        let parsed = parse_description("Transaction accepted");
        assert_eq!(parsed.transfer_ref, None);
        assert_eq!(parsed.new_balance, None);
    }

    #[test]
    fn ref_pattern_is_exact() {
        // Wrong digit counts must not match.
        let parsed = parse_description("R12345.0001.000001 New balance is Ksh. 10.00");
        assert_eq!(parsed.transfer_ref, None);
        assert_eq!(parsed.new_balance, Some(dec!(10.00)));
    }

    #[test]
    fn transfer_payload_shape_matches_the_dealer_contract() {
        let payload = TransferRequest {
            sender_msisdn: "700123456",
            amount: 10_000,
            service_pin: BASE64.encode("1234"),
            receiver_msisdn: "712345678",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["senderMsisdn"], "700123456");
        assert_eq!(json["amount"], 10_000);
        assert_eq!(json["servicePin"], "MTIzNA==");
        assert_eq!(json["receiverMsisdn"], "712345678");
    }
}
