//! # Fault Taxonomy
//!
//! Classification for the durable error log. Every failure the gateway
//! observes is recorded under one of these kinds so reconciliation can
//! query by failure class rather than by message text.

use serde::{Deserialize, Serialize};

use crate::ids::CheckoutRequestId;

/// Top-level failure class, persisted as `error_log.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// Any pre-rail or rail-rejection failure during STK push initiation.
    StkPushInitiationError,
    /// Malformed payment callback or unknown checkout request id.
    StkCallbackError,
    /// Payment rejected, cancelled, or timed out by the payer.
    StkPaymentError,
    /// Airtime could not be delivered; see the sub-kind.
    AirtimeFulfillmentError,
    /// Provider-reported float balance disagrees with the local ledger.
    FloatReconciliationWarning,
    /// Best-effort analytics notification failed.
    AnalyticsNotificationError,
    /// Unhandled error caught at the engine boundary.
    CriticalFulfillmentError,
}

impl FaultKind {
    /// The persisted SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::StkPushInitiationError => "STK_PUSH_INITIATION_ERROR",
            FaultKind::StkCallbackError => "STK_CALLBACK_ERROR",
            FaultKind::StkPaymentError => "STK_PAYMENT_ERROR",
            FaultKind::AirtimeFulfillmentError => "AIRTIME_FULFILLMENT_ERROR",
            FaultKind::FloatReconciliationWarning => "FLOAT_RECONCILIATION_WARNING",
            FaultKind::AnalyticsNotificationError => "ANALYTICS_NOTIFICATION_ERROR",
            FaultKind::CriticalFulfillmentError => "CRITICAL_FULFILLMENT_ERROR",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finer classification under [`FaultKind::AirtimeFulfillmentError`],
/// persisted as `error_log.sub_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultSubKind {
    /// Collected amount falls outside the accepted top-up range.
    InvalidAmountRange,
    /// Destination number belongs to no supported carrier.
    UnknownCarrier,
    /// Both primary and fallback dispatch attempts failed.
    AirtimeDispatchFailed,
    /// Dispatch aborted by an unexpected runtime error.
    RuntimeException,
}

impl FaultSubKind {
    /// The persisted SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultSubKind::InvalidAmountRange => "INVALID_AMOUNT_RANGE",
            FaultSubKind::UnknownCarrier => "UNKNOWN_CARRIER",
            FaultSubKind::AirtimeDispatchFailed => "AIRTIME_DISPATCH_FAILED",
            FaultSubKind::RuntimeException => "RUNTIME_EXCEPTION",
        }
    }
}

impl std::fmt::Display for FaultSubKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault headed for the durable error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    /// Top-level failure class.
    pub kind: FaultKind,
    /// Finer classification, where the kind defines one.
    pub sub_kind: Option<FaultSubKind>,
    /// The transaction this fault belongs to, when known.
    pub checkout_request_id: Option<CheckoutRequestId>,
    /// Raw upstream context: response bodies, result codes, messages.
    pub context: serde_json::Value,
}

impl Fault {
    /// A fault with no sub-kind.
    pub fn new(kind: FaultKind, context: serde_json::Value) -> Self {
        Self {
            kind,
            sub_kind: None,
            checkout_request_id: None,
            context,
        }
    }

    /// Attach a sub-kind.
    pub fn with_sub_kind(mut self, sub_kind: FaultSubKind) -> Self {
        self.sub_kind = Some(sub_kind);
        self
    }

    /// Attach the owning transaction id.
    pub fn for_request(mut self, id: CheckoutRequestId) -> Self {
        self.checkout_request_id = Some(id);
        self
    }
}
