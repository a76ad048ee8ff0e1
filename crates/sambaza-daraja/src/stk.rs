//! # STK Push
//!
//! The push-to-pay request: the rail pops a PIN prompt on the payer's
//! phone and answers immediately with a `CheckoutRequestID`; the actual
//! payment outcome arrives later on the callback URL.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sambaza_core::{CheckoutRequestId, Msisdn};

use crate::auth::timestamp_and_password;
use crate::error::DarajaError;
use crate::DarajaClient;

#[derive(Debug, Serialize)]
struct StkPushRequest<'a> {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: &'a str,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Amount")]
    amount: u64,
    #[serde(rename = "PartyA")]
    party_a: String,
    #[serde(rename = "PartyB")]
    party_b: &'a str,
    #[serde(rename = "PhoneNumber")]
    phone_number: String,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    #[serde(rename = "AccountReference")]
    account_reference: &'a str,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: &'static str,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    customer_message: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// A push the rail accepted into its queue.
#[derive(Debug, Clone)]
pub struct StkPushAccepted {
    /// The rail's id for this request — the canonical transaction key.
    pub checkout_request_id: CheckoutRequestId,
    /// The rail's merchant-side correlation id.
    pub merchant_request_id: Option<String>,
    /// Text the rail suggests showing the customer.
    pub customer_message: Option<String>,
}

impl DarajaClient {
    /// Send an STK push asking `payer` to approve `amount` KES.
    ///
    /// `account_reference` is what the payer sees on their statement; the
    /// gateway passes the destination number so a top-up for someone else
    /// is recognizable.
    pub async fn stk_push(
        &self,
        payer: &Msisdn,
        amount: Decimal,
        account_reference: &str,
    ) -> Result<StkPushAccepted, DarajaError> {
        // The rail takes whole shillings.
        if !amount.is_integer() {
            return Err(DarajaError::FractionalAmount(amount));
        }
        let whole = amount
            .to_u64()
            .ok_or(DarajaError::FractionalAmount(amount))?;

        let (timestamp, password) =
            timestamp_and_password(&self.config.short_code, &self.config.passkey, Utc::now());
        let payload = StkPushRequest {
            business_short_code: &self.config.short_code,
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: whole,
            party_a: payer.international(),
            party_b: &self.config.short_code,
            phone_number: payer.international(),
            callback_url: self.config.callback_url.as_str(),
            account_reference,
            transaction_desc: "Airtime purchase",
        };

        tracing::debug!(payer = %payer, %amount, "sending STK push");
        let token = self.bearer_token().await?;
        let url = self
            .config
            .base_url
            .join("mpesa/stkpush/v1/processrequest")
            .map_err(|e| DarajaError::Credential(format!("bad push URL: {e}")))?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DarajaError::Http {
                endpoint: "stkpush/processrequest".into(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DarajaError::Api {
                endpoint: "stkpush/processrequest".into(),
                status: status.as_u16(),
                body,
            });
        }

        let body: StkPushResponse =
            response
                .json()
                .await
                .map_err(|e| DarajaError::Deserialization {
                    endpoint: "stkpush/processrequest".into(),
                    source: e,
                })?;

        match (body.response_code.as_deref(), body.checkout_request_id) {
            (Some("0"), Some(id)) => Ok(StkPushAccepted {
                checkout_request_id: CheckoutRequestId::new(id),
                merchant_request_id: body.merchant_request_id,
                customer_message: body.customer_message,
            }),
            _ => Err(DarajaError::Rejected {
                code: body
                    .response_code
                    .or(body.error_code)
                    .unwrap_or_else(|| "unknown".into()),
                description: body
                    .response_description
                    .or(body.error_message)
                    .unwrap_or_default(),
            }),
        }
    }
}
