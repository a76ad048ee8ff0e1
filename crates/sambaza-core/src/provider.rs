//! # Dispatch Provider Labels
//!
//! Which provider delivered (or failed to deliver) the airtime, as recorded
//! on transactions and sales.

use serde::{Deserialize, Serialize};

/// The dispatch provider used for a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Safaricom dealer-direct API, first choice for the home telco.
    DealerDirect,
    /// Aggregator API, the only route for non-home carriers.
    Aggregator,
    /// Aggregator used as fallback after a dealer-direct failure.
    AggregatorFallback,
}

impl ProviderKind {
    /// Canonical kebab-case name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DealerDirect => "dealer-direct",
            ProviderKind::Aggregator => "aggregator",
            ProviderKind::AggregatorFallback => "aggregator-fallback",
        }
    }

    /// Parse a persisted provider name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dealer-direct" => Some(ProviderKind::DealerDirect),
            "aggregator" => Some(ProviderKind::Aggregator),
            "aggregator-fallback" => Some(ProviderKind::AggregatorFallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
