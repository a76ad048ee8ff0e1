//! # Aggregator Provider
//!
//! Multi-telco airtime dispatch. The API takes a batch of recipients; the
//! gateway always sends a batch of one, so success is exactly "the first
//! recipient's status is `Sent` and its error is `None`".

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use url::Url;

use sambaza_core::{Carrier, Msisdn, ProviderKind};

use crate::error::AirtimeError;
use crate::{AirtimeDispatch, DispatchReceipt};

/// Configuration for the aggregator provider.
#[derive(Clone)]
pub struct AggregatorConfig {
    /// Airtime send endpoint.
    pub airtime_url: Url,
    /// Account username, sent in the request body.
    pub username: String,
    /// API key, sent as the `apiKey` header.
    pub api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AggregatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorConfig")
            .field("airtime_url", &self.airtime_url)
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Recipient {
    #[serde(rename = "phoneNumber")]
    phone_number: String,
    amount: Decimal,
    #[serde(rename = "currencyCode")]
    currency_code: &'static str,
}

#[derive(Debug, Serialize)]
struct SendRequest {
    username: String,
    recipients: Vec<Recipient>,
}

/// The aggregator [`AirtimeDispatch`] implementation.
pub struct Aggregator {
    http: reqwest::Client,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Build the provider.
    pub fn new(config: AggregatorConfig) -> Result<Self, AirtimeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AirtimeError::Http {
                endpoint: "aggregator_client_init".into(),
                source: e,
            })?;
        Ok(Self { http, config })
    }
}

/// Whether an aggregator response body reports a delivered dispatch.
///
/// Split out of the HTTP path so the success rule is testable against
/// captured payloads.
pub(crate) fn is_delivered(raw: &serde_json::Value) -> bool {
    let first = &raw["responses"][0];
    first["status"] == "Sent"
        && (first["errorMessage"] == "None" || first["errorMessage"].is_null())
}

#[async_trait]
impl AirtimeDispatch for Aggregator {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Aggregator
    }

    async fn dispatch(
        &self,
        destination: &Msisdn,
        amount: Decimal,
        _carrier: Carrier,
    ) -> Result<DispatchReceipt, AirtimeError> {
        let payload = SendRequest {
            username: self.config.username.clone(),
            recipients: vec![Recipient {
                phone_number: destination.e164(),
                amount,
                currency_code: "KES",
            }],
        };

        let response = self
            .http
            .post(self.config.airtime_url.clone())
            .header("apiKey", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AirtimeError::Http {
                endpoint: "aggregator/airtime".into(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AirtimeError::Api {
                endpoint: "aggregator/airtime".into(),
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| AirtimeError::Deserialization {
                    endpoint: "aggregator/airtime".into(),
                    source: e,
                })?;

        if !is_delivered(&raw) {
            return Err(AirtimeError::Refused {
                provider: ProviderKind::Aggregator,
                detail: raw,
            });
        }

        let provider_ref = raw["responses"][0]["requestId"]
            .as_str()
            .map(|s| s.to_string());
        tracing::debug!(
            receiver = destination.national(),
            request_id = provider_ref.as_deref().unwrap_or("-"),
            "aggregator dispatch sent"
        );
        Ok(DispatchReceipt {
            provider: ProviderKind::Aggregator,
            provider_ref,
            reported_balance: None,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn a_sent_recipient_with_no_error_is_delivered() {
        let raw = json!({
            "errorMessage": "None",
            "numSent": 1,
            "responses": [{
                "phoneNumber": "+254733000000",
                "amount": "KES 102.0000",
                "status": "Sent",
                "requestId": "ATQid_1f2e",
                "errorMessage": "None"
            }]
        });
        assert!(is_delivered(&raw));
    }

    #[test]
    fn a_failed_recipient_is_not_delivered() {
        let raw = json!({
            "responses": [{
                "phoneNumber": "+254733000000",
                "status": "Failed",
                "errorMessage": "Insufficient balance"
            }]
        });
        assert!(!is_delivered(&raw));
    }

    #[test]
    fn an_empty_response_list_is_not_delivered() {
        assert!(!is_delivered(&json!({"responses": []})));
        assert!(!is_delivered(&json!({})));
    }

    #[test]
    fn request_batch_has_one_e164_recipient_in_kes() {
        let payload = SendRequest {
            username: "sambazapay".into(),
            recipients: vec![Recipient {
                phone_number: "+254733000000".into(),
                amount: dec!(102),
                currency_code: "KES",
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["recipients"].as_array().unwrap().len(), 1);
        assert_eq!(json["recipients"][0]["phoneNumber"], "+254733000000");
        assert_eq!(json["recipients"][0]["currencyCode"], "KES");
    }
}
