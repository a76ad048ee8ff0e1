#![deny(missing_docs)]

//! # sambaza-airtime — Airtime Dispatch Providers
//!
//! Two ways to put airtime on a phone, behind one trait:
//!
//! - [`DealerDirect`] — the home telco's first-party dealer API. Cheapest
//!   route for Safaricom numbers; wants amounts in cents, a base64 service
//!   PIN, and buries its facts in a free-text description.
//! - [`Aggregator`] — the multi-telco aggregator. The only route for
//!   non-home carriers and the fallback when the dealer route fails.
//!
//! Which provider runs, in what order, and what happens to the floats is
//! the lifecycle engine's business — a provider here does exactly one
//! dispatch attempt and reports what the upstream said.

pub mod aggregator;
pub mod cache;
pub mod dealer;
pub mod error;

pub use aggregator::{Aggregator, AggregatorConfig};
pub use cache::TtlCell;
pub use dealer::{DealerConfig, DealerDirect};
pub use error::AirtimeError;

use async_trait::async_trait;
use rust_decimal::Decimal;

use sambaza_core::{Carrier, Msisdn, ProviderKind};

/// What a successful dispatch attempt reports back.
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    /// Which provider delivered.
    pub provider: ProviderKind,
    /// The provider's own reference for the transfer, when it gives one.
    pub provider_ref: Option<String>,
    /// Authoritative post-dispatch float balance, when the provider
    /// reports one (the dealer does, the aggregator does not).
    pub reported_balance: Option<Decimal>,
    /// The raw provider response, for the sale record.
    pub raw: serde_json::Value,
}

/// One dispatch attempt against one provider.
#[async_trait]
pub trait AirtimeDispatch: Send + Sync {
    /// Which provider this is, for records and routing.
    fn kind(&self) -> ProviderKind;

    /// Deliver `amount` KES of airtime to `destination`.
    ///
    /// Returns the provider's receipt on success. Any non-success —
    /// transport failure, upstream rejection, unparseable response — is an
    /// [`AirtimeError`] carrying whatever the upstream said.
    async fn dispatch(
        &self,
        destination: &Msisdn,
        amount: Decimal,
        carrier: Carrier,
    ) -> Result<DispatchReceipt, AirtimeError>;
}
