#![deny(missing_docs)]

//! # sambaza-core — Foundational Types for the SambazaPay Gateway
//!
//! This crate defines the domain vocabulary every other crate in the
//! workspace depends on. It has no internal crate dependencies — only
//! `serde`, `serde_json`, `thiserror`, and `rust_decimal` from the
//! external ecosystem, and it performs no I/O.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`CheckoutRequestId`] is
//!    not a `String`, and an [`Msisdn`] is not a phone-shaped string — both
//!    are validated at the boundary and trusted everywhere else.
//!
//! 2. **One [`Carrier`] enum, one prefix table.** Classification is a pure
//!    function over enumerated national prefixes; no scattered string
//!    comparisons.
//!
//! 3. **The status machine is data.** [`TxStatus`] transitions are checked
//!    with `can_transition_to` because the current state lives in the
//!    database across processes — a typestate encoding cannot gate a row
//!    another process wrote.
//!
//! 4. **Money is [`rust_decimal::Decimal`].** Floats never carry shillings.

pub mod bonus;
pub mod carrier;
pub mod fault;
pub mod ids;
pub mod money;
pub mod msisdn;
pub mod provider;
pub mod status;

pub use bonus::{bonus_for, Bonus, BonusSettings};
pub use carrier::Carrier;
pub use fault::{Fault, FaultKind, FaultSubKind};
pub use ids::{CheckoutRequestId, DealerRef, PaymentReceipt};
pub use money::{to_minor_units, validate_topup_amount, AmountError, MAX_TOPUP, MIN_TOPUP};
pub use msisdn::{Msisdn, MsisdnError};
pub use provider::ProviderKind;
pub use status::{TxStatus, TxStatusParseError};
