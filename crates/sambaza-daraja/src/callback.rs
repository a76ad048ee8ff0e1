//! # Callback Payloads
//!
//! The rail's asynchronous answers. The payment callback buries its
//! facts in a name-keyed metadata array (`CallbackMetadata.Item[]`);
//! failure callbacks omit the array entirely, so every accessor is
//! `Option` and decoding never panics on a missing item.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use sambaza_core::{CheckoutRequestId, PaymentReceipt};

/// One `{Name, Value}` pair from the metadata array. `Value` is a number
/// for amounts and phone numbers, a string for receipts, and sometimes
/// absent altogether.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataItem {
    /// The item's key.
    #[serde(rename = "Name")]
    pub name: String,
    /// The item's value, when present.
    #[serde(rename = "Value")]
    pub value: Option<serde_json::Value>,
}

/// The payment callback's metadata array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackMetadata {
    /// The name-keyed items.
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

impl CallbackMetadata {
    fn value(&self, name: &str) -> Option<&serde_json::Value> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }

    /// The amount actually collected, KES.
    pub fn amount(&self) -> Option<Decimal> {
        match self.value("Amount")? {
            serde_json::Value::Number(n) => {
                if let Some(int) = n.as_i64() {
                    Some(Decimal::from(int))
                } else {
                    n.as_f64().and_then(Decimal::from_f64)
                }
            }
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The M-Pesa receipt number.
    pub fn receipt(&self) -> Option<PaymentReceipt> {
        match self.value("MpesaReceiptNumber")? {
            serde_json::Value::String(s) => Some(PaymentReceipt::new(s.clone())),
            _ => None,
        }
    }

    /// The payer's number as the rail reports it (digits, `254…`).
    pub fn phone_number(&self) -> Option<String> {
        match self.value("PhoneNumber")? {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: StkCallbackInner,
}

#[derive(Debug, Deserialize)]
struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    body: StkCallbackBody,
}

#[derive(Debug, Deserialize)]
struct StkCallbackInner {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    result_code: i64,
    #[serde(rename = "ResultDesc")]
    result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    metadata: Option<CallbackMetadata>,
}

/// A decoded payment callback.
#[derive(Debug, Clone)]
pub struct StkCallback {
    /// The rail's merchant-side correlation id.
    pub merchant_request_id: Option<String>,
    /// The transaction this callback belongs to.
    pub checkout_request_id: CheckoutRequestId,
    /// `0` means the payment was collected.
    pub result_code: i64,
    /// The rail's human-readable outcome.
    pub result_desc: String,
    /// Metadata items; empty on failure callbacks.
    pub metadata: CallbackMetadata,
}

impl StkCallback {
    /// Decode the callback envelope the rail posts to the callback URL.
    pub fn from_json(raw: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let envelope: StkCallbackEnvelope = serde_json::from_value(raw.clone())?;
        let inner = envelope.body.stk_callback;
        Ok(Self {
            merchant_request_id: inner.merchant_request_id,
            checkout_request_id: CheckoutRequestId::new(inner.checkout_request_id),
            result_code: inner.result_code,
            result_desc: inner.result_desc.unwrap_or_default(),
            metadata: inner.metadata.unwrap_or_default(),
        })
    }

    /// Whether the payment was collected.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

#[derive(Debug, Deserialize)]
struct ResultEnvelope {
    #[serde(rename = "Result")]
    result: ResultInner,
}

#[derive(Debug, Deserialize)]
struct ResultInner {
    #[serde(rename = "ResultCode")]
    result_code: Option<i64>,
    #[serde(rename = "ResultDesc")]
    result_desc: Option<String>,
    #[serde(rename = "OriginatorConversationID")]
    originator_conversation_id: Option<String>,
    #[serde(rename = "ConversationID")]
    conversation_id: Option<String>,
    #[serde(rename = "TransactionID")]
    transaction_id: Option<String>,
}

/// A decoded reversal outcome — from the result callback or, with no
/// result code, from the queue-timeout callback.
#[derive(Debug, Clone)]
pub struct ReversalOutcome {
    /// `Some(0)` means reversed; other codes mean the reversal failed;
    /// `None` means the payload carried no verdict (timeout shape).
    pub result_code: Option<i64>,
    /// The rail's human-readable outcome.
    pub result_desc: String,
    /// Correlates back to the submission.
    pub originator_conversation_id: Option<String>,
    /// The rail's conversation id.
    pub conversation_id: Option<String>,
    /// The reversal transaction's own id on the rail.
    pub transaction_id: Option<String>,
}

impl ReversalOutcome {
    /// Decode a reversal result or timeout envelope.
    pub fn from_json(raw: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let envelope: ResultEnvelope = serde_json::from_value(raw.clone())?;
        let inner = envelope.result;
        Ok(Self {
            result_code: inner.result_code,
            result_desc: inner.result_desc.unwrap_or_default(),
            originator_conversation_id: inner.originator_conversation_id,
            conversation_id: inner.conversation_id,
            transaction_id: inner.transaction_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn success_payload() -> serde_json::Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_1",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 100.0},
                            {"Name": "MpesaReceiptNumber", "Value": "QK123"},
                            {"Name": "TransactionDate", "Value": 20250101123000i64},
                            {"Name": "PhoneNumber", "Value": 254700000001i64}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn decodes_a_successful_payment_callback() {
        let callback = StkCallback::from_json(&success_payload()).unwrap();
        assert!(callback.is_success());
        assert_eq!(callback.checkout_request_id.as_str(), "ws_CO_1");
        assert_eq!(callback.metadata.amount(), Some(dec!(100)));
        assert_eq!(
            callback.metadata.receipt().map(|r| r.as_str().to_string()),
            Some("QK123".to_string())
        );
        assert_eq!(
            callback.metadata.phone_number(),
            Some("254700000001".to_string())
        );
    }

    #[test]
    fn decodes_a_cancelled_payment_without_metadata() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-2",
                    "CheckoutRequestID": "ws_CO_2",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });
        let callback = StkCallback::from_json(&payload).unwrap();
        assert!(!callback.is_success());
        assert_eq!(callback.result_code, 1032);
        assert_eq!(callback.metadata.amount(), None);
        assert!(callback.metadata.receipt().is_none());
    }

    #[test]
    fn tolerates_missing_items_and_absent_values() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "CheckoutRequestID": "ws_CO_3",
                    "ResultCode": 0,
                    "ResultDesc": "ok",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount"},
                            {"Name": "Balance", "Value": null}
                        ]
                    }
                }
            }
        });
        let callback = StkCallback::from_json(&payload).unwrap();
        assert_eq!(callback.metadata.amount(), None);
        assert!(callback.metadata.receipt().is_none());
    }

    #[test]
    fn integer_amounts_decode_exactly() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "CheckoutRequestID": "ws_CO_4",
                    "ResultCode": 0,
                    "ResultDesc": "ok",
                    "CallbackMetadata": {"Item": [{"Name": "Amount", "Value": 4999}]}
                }
            }
        });
        let callback = StkCallback::from_json(&payload).unwrap();
        assert_eq!(callback.metadata.amount(), Some(dec!(4999)));
    }

    #[test]
    fn decodes_a_reversal_result() {
        let payload = json!({
            "Result": {
                "ResultType": 0,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "OriginatorConversationID": "71840-27539181-07",
                "ConversationID": "AG_20250101_0000123",
                "TransactionID": "QKR91H3X"
            }
        });
        let outcome = ReversalOutcome::from_json(&payload).unwrap();
        assert_eq!(outcome.result_code, Some(0));
        assert_eq!(
            outcome.originator_conversation_id.as_deref(),
            Some("71840-27539181-07")
        );
    }

    #[test]
    fn decodes_a_timeout_shape_without_result_code() {
        let payload = json!({
            "Result": {
                "ResultDesc": "Request timed out in queue",
                "OriginatorConversationID": "71840-27539181-08"
            }
        });
        let outcome = ReversalOutcome::from_json(&payload).unwrap();
        assert_eq!(outcome.result_code, None);
        assert_eq!(
            outcome.originator_conversation_id.as_deref(),
            Some("71840-27539181-08")
        );
    }
}
