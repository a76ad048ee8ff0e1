#![deny(missing_docs)]

//! # sambaza-engine — Transaction Lifecycle Engine
//!
//! The part that must not be wrong. Three loosely-coupled externals — the
//! payment rail, two airtime providers, and the store — each fail
//! independently and deliver their answers asynchronously, sometimes more
//! than once. The engine's job is the invariant that survives all of that:
//!
//! > every successful collection ends in delivered airtime or a reversal
//! > attempt, with a durable trail either way.
//!
//! ## How idempotency works
//!
//! Every entry point is keyed by the rail's `CheckoutRequestID`, and every
//! state change goes through a store transition gated on the expected
//! pre-state. A duplicate callback (the rail retries; operators replay)
//! loses its gate and performs no side-effect: no second float movement,
//! no second dispatch, no second reversal.
//!
//! ## How float accounting works
//!
//! The float debit lands before the dispatch attempt; a failed attempt
//! credits back before any fallback debits again. A successful aggregator
//! dispatch credits a fixed retention commission. Net effect per the
//! outcome, always: success costs one dispatched amount (plus commission
//! back on the aggregator route), failure costs nothing.

pub mod analytics;
pub mod callback;
pub mod error;
pub mod initiation;
pub mod rail;
pub mod reversal;
pub mod status;

pub use analytics::AnalyticsNotifier;
pub use error::EngineError;
pub use initiation::{InitiationAccepted, InitiationRequest};
pub use rail::PaymentRail;
pub use status::StatusView;

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use sambaza_airtime::AirtimeDispatch;
use sambaza_store::Store;

/// Fraction of the original amount credited to the aggregator float as
/// retention commission on a successful aggregator dispatch.
pub(crate) const AGGREGATOR_COMMISSION_RATE: Decimal = dec!(0.04);

/// Local-vs-provider float drift below this is ignored as rounding.
pub(crate) const FLOAT_DRIFT_TOLERANCE: Decimal = dec!(0.01);

/// The lifecycle engine. Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) rail: Arc<dyn PaymentRail>,
    pub(crate) dealer: Arc<dyn AirtimeDispatch>,
    pub(crate) aggregator: Arc<dyn AirtimeDispatch>,
    pub(crate) analytics: Option<AnalyticsNotifier>,
}

impl Engine {
    /// Wire an engine from its collaborators.
    pub fn new(
        store: Arc<dyn Store>,
        rail: Arc<dyn PaymentRail>,
        dealer: Arc<dyn AirtimeDispatch>,
        aggregator: Arc<dyn AirtimeDispatch>,
        analytics: Option<AnalyticsNotifier>,
    ) -> Self {
        Self {
            store,
            rail,
            dealer,
            aggregator,
            analytics,
        }
    }

    /// Shared handle to the store, for read-side endpoints.
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }
}
