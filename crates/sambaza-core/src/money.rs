//! # Money Rules
//!
//! Shilling amounts are [`rust_decimal::Decimal`] everywhere. The payment
//! rail speaks whole shillings, the dealer API speaks cents; both
//! conversions live here so the unit mismatch cannot leak into callers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Smallest top-up the gateway accepts, in KES.
pub const MIN_TOPUP: Decimal = dec!(5);

/// Largest top-up the gateway accepts, in KES.
pub const MAX_TOPUP: Decimal = dec!(5000);

/// Errors from amount validation and unit conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Amount falls outside the accepted `[5, 5000]` KES range.
    #[error("amount {0} is outside the accepted range [{MIN_TOPUP}, {MAX_TOPUP}] KES")]
    OutOfRange(Decimal),

    /// Amount is not representable in integer minor units.
    #[error("amount {0} cannot be represented in cents")]
    NotRepresentable(Decimal),
}

/// Validate a requested top-up amount against the accepted range.
///
/// Both bounds are inclusive: exactly 5 and exactly 5000 pass.
pub fn validate_topup_amount(amount: Decimal) -> Result<Decimal, AmountError> {
    if amount < MIN_TOPUP || amount > MAX_TOPUP {
        return Err(AmountError::OutOfRange(amount));
    }
    Ok(amount)
}

/// Convert a shilling amount to integer minor units (cents).
///
/// The dealer-direct API takes amounts in cents. Sub-cent precision is a
/// caller bug, not a rounding opportunity.
pub fn to_minor_units(amount: Decimal) -> Result<i64, AmountError> {
    let cents = amount * dec!(100);
    if cents.fract() != Decimal::ZERO {
        return Err(AmountError::NotRepresentable(amount));
    }
    cents.to_i64().ok_or(AmountError::NotRepresentable(amount))
}
