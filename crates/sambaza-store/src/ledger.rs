//! # Float Accounts
//!
//! The two prepaid balances the gateway draws on. Dispatches debit them,
//! failed dispatches credit them back, and aggregator sales credit a
//! retention commission.

use serde::{Deserialize, Serialize};

/// A named prepaid float held with a dispatch provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatAccount {
    /// Dealer float with the home telco, consumed by dealer-direct dispatch.
    SafaricomDealer,
    /// Prepaid balance with the aggregator.
    Africastalking,
}

impl FloatAccount {
    /// The persisted account name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FloatAccount::SafaricomDealer => "safaricom_dealer",
            FloatAccount::Africastalking => "africastalking",
        }
    }

    /// Parse a persisted account name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "safaricom_dealer" => Some(FloatAccount::SafaricomDealer),
            "africastalking" => Some(FloatAccount::Africastalking),
            _ => None,
        }
    }
}

impl std::fmt::Display for FloatAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
