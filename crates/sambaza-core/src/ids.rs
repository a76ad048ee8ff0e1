//! # Identifier Newtypes
//!
//! Domain-primitive newtypes for identifiers flowing through the gateway.
//! Each identifier is a distinct type — you cannot pass a [`PaymentReceipt`]
//! where a [`CheckoutRequestId`] is expected.

use serde::{Deserialize, Serialize};

/// The payment rail's server-assigned identifier for an STK push request.
///
/// This is the canonical key for a transaction: the rail echoes it back in
/// every callback, so all persisted records are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutRequestId(String);

impl CheckoutRequestId {
    /// Wrap a rail-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Access the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckoutRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CheckoutRequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The M-Pesa receipt number confirming a collected payment (e.g. `QK12XY34`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReceipt(String);

impl PaymentReceipt {
    /// Wrap a rail-issued receipt number.
    pub fn new(receipt: impl Into<String>) -> Self {
        Self(receipt.into())
    }

    /// Access the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The dealer platform's reference for a completed airtime transfer,
/// shaped `R######.####.######` and extracted from the free-text response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealerRef(String);

impl DealerRef {
    /// Wrap a dealer reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Access the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DealerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
