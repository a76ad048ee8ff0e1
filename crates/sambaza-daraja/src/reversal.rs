//! # Transaction Reversal
//!
//! Refunds a collected payment. Authentication differs from the push: the
//! initiator password is RSA-encrypted (PKCS#1 v1.5) under the rail's
//! public certificate and sent base64-encoded as the `SecurityCredential`.
//! The certificate is read once at client construction; the raw password
//! never appears in logs or `Debug` output.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sambaza_core::CheckoutRequestId;

use crate::error::DarajaError;
use crate::DarajaClient;

/// The RSA-encrypted initiator password, prepared once at startup.
#[derive(Clone)]
pub struct SecurityCredential(String);

impl SecurityCredential {
    /// Encrypt `initiator_password` under the certificate at `cert_path`.
    pub fn from_certificate_file(
        cert_path: &str,
        initiator_password: &str,
    ) -> Result<Self, DarajaError> {
        let pem_bytes = std::fs::read(cert_path).map_err(|e| {
            DarajaError::Credential(format!("cannot read certificate {cert_path}: {e}"))
        })?;
        Self::from_certificate_pem(&pem_bytes, initiator_password)
    }

    /// Encrypt `initiator_password` under a PEM-encoded certificate.
    pub fn from_certificate_pem(
        pem_bytes: &[u8],
        initiator_password: &str,
    ) -> Result<Self, DarajaError> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(pem_bytes)
            .map_err(|e| DarajaError::Credential(format!("invalid PEM: {e}")))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| DarajaError::Credential(format!("invalid certificate: {e}")))?;
        let key = RsaPublicKey::from_pkcs1_der(cert.public_key().subject_public_key.data.as_ref())
            .map_err(|e| DarajaError::Credential(format!("unsupported public key: {e}")))?;

        let mut rng = rand::thread_rng();
        let encrypted = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, initiator_password.as_bytes())
            .map_err(|e| DarajaError::Credential(format!("encryption failed: {e}")))?;
        Ok(Self(BASE64.encode(encrypted)))
    }

    /// The base64 credential as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecurityCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecurityCredential([REDACTED])")
    }
}

#[derive(Debug, Serialize)]
struct ReversalRequest<'a> {
    #[serde(rename = "Initiator")]
    initiator: &'a str,
    #[serde(rename = "SecurityCredential")]
    security_credential: &'a str,
    #[serde(rename = "CommandID")]
    command_id: &'static str,
    #[serde(rename = "TransactionID")]
    transaction_id: &'a str,
    #[serde(rename = "Amount")]
    amount: u64,
    #[serde(rename = "ReceiverParty")]
    receiver_party: &'a str,
    // The rail's own field name carries this spelling.
    #[serde(rename = "RecieverIdentifierType")]
    receiver_identifier_type: &'static str,
    #[serde(rename = "QueueTimeOutURL")]
    queue_timeout_url: &'a str,
    #[serde(rename = "ResultURL")]
    result_url: &'a str,
    #[serde(rename = "Remarks")]
    remarks: String,
    #[serde(rename = "Occasion")]
    occasion: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReversalResponse {
    #[serde(rename = "OriginatorConversationID")]
    originator_conversation_id: Option<String>,
    #[serde(rename = "ConversationID")]
    conversation_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// A reversal the rail accepted into its queue.
///
/// The conversation ids are the only handle the asynchronous result and
/// timeout callbacks carry, so the engine persists them alongside the
/// transaction before considering the reversal submitted.
#[derive(Debug, Clone, Serialize)]
pub struct ReversalAccepted {
    /// Correlates the result/timeout callback to this submission.
    pub originator_conversation_id: String,
    /// The rail's conversation id.
    pub conversation_id: Option<String>,
    /// The request body as sent, for the reconciliation record.
    pub request_snapshot: serde_json::Value,
}

impl DarajaClient {
    /// Ask the rail to reverse a collected payment.
    ///
    /// `receipt` is the M-Pesa receipt being reversed; `checkout_id` rides
    /// along as the `Occasion` so operators can trace a reversal back to
    /// its transaction from rail-side logs.
    pub async fn reverse(
        &self,
        receipt: &str,
        amount: Decimal,
        checkout_id: &CheckoutRequestId,
    ) -> Result<ReversalAccepted, DarajaError> {
        if !amount.is_integer() {
            return Err(DarajaError::FractionalAmount(amount));
        }
        let whole = amount
            .to_u64()
            .ok_or(DarajaError::FractionalAmount(amount))?;

        let payload = ReversalRequest {
            initiator: &self.config.initiator_name,
            security_credential: self.credential.as_str(),
            command_id: "TransactionReversal",
            transaction_id: receipt,
            amount: whole,
            receiver_party: &self.config.short_code,
            receiver_identifier_type: "11",
            queue_timeout_url: self.config.reversal_timeout_url.as_str(),
            result_url: self.config.reversal_result_url.as_str(),
            remarks: format!("Airtime fulfillment failed for {checkout_id}"),
            occasion: checkout_id.as_str(),
        };
        // Snapshot without the credential: it has no reconciliation value
        // and must not land in the store.
        let request_snapshot = serde_json::json!({
            "TransactionID": receipt,
            "Amount": whole,
            "ReceiverParty": payload.receiver_party,
            "Occasion": payload.occasion,
        });

        tracing::debug!(%checkout_id, %amount, "submitting reversal");
        let token = self.bearer_token().await?;
        let url = self
            .config
            .base_url
            .join("mpesa/reversal/v1/request")
            .map_err(|e| DarajaError::Credential(format!("bad reversal URL: {e}")))?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DarajaError::Http {
                endpoint: "reversal/request".into(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DarajaError::Api {
                endpoint: "reversal/request".into(),
                status: status.as_u16(),
                body,
            });
        }

        let body: ReversalResponse =
            response
                .json()
                .await
                .map_err(|e| DarajaError::Deserialization {
                    endpoint: "reversal/request".into(),
                    source: e,
                })?;

        match (body.response_code.as_deref(), body.originator_conversation_id) {
            (Some("0"), Some(originator_conversation_id)) => Ok(ReversalAccepted {
                originator_conversation_id,
                conversation_id: body.conversation_id,
                request_snapshot,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_credential_debug_never_shows_the_value() {
        let credential = SecurityCredential("c2VjcmV0".to_string());
        assert_eq!(format!("{credential:?}"), "SecurityCredential([REDACTED])");
    }

    #[test]
    fn reversal_payload_uses_the_rail_field_names() {
        let payload = ReversalRequest {
            initiator: "apiuser",
            security_credential: "AAAA",
            command_id: "TransactionReversal",
            transaction_id: "QK123",
            amount: 100,
            receiver_party: "600000",
            receiver_identifier_type: "11",
            queue_timeout_url: "https://gw.example/daraja-reversal-timeout",
            result_url: "https://gw.example/daraja-reversal-result",
            remarks: "Airtime fulfillment failed for ws_CO_1".into(),
            occasion: "ws_CO_1",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["CommandID"], "TransactionReversal");
        assert_eq!(json["RecieverIdentifierType"], "11");
        assert_eq!(json["TransactionID"], "QK123");
        assert_eq!(json["Amount"], 100);
        assert_eq!(json["Occasion"], "ws_CO_1");
    }
}
