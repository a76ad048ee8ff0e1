//! # Bonus Computation
//!
//! Promotional airtime added on top of the purchased amount, from per-telco
//! percentages held in settings. Safaricom bonuses keep cent precision;
//! every other carrier's bonus rounds half-up to a whole shilling.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::carrier::Carrier;

/// Per-telco bonus percentages, the singleton settings entity.
///
/// Missing or zero percentages yield a zero bonus — the gateway never fails
/// a dispatch over bonus configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusSettings {
    /// Percentage applied to Safaricom top-ups (dealer-direct dispatch).
    pub safaricom_pct: Decimal,
    /// Percentage applied to top-ups dispatched through the aggregator.
    pub africastalking_pct: Decimal,
}

impl BonusSettings {
    /// The percentage that applies to a carrier.
    pub fn pct_for(&self, carrier: Carrier) -> Decimal {
        if carrier.is_home() {
            self.safaricom_pct
        } else {
            self.africastalking_pct
        }
    }
}

/// A computed bonus: the amount to add and the rate that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonus {
    /// Bonus airtime in KES.
    pub amount: Decimal,
    /// The percentage used, for the sale record.
    pub rate: Decimal,
}

impl Bonus {
    /// A zero bonus at a zero rate.
    pub fn zero() -> Self {
        Self {
            amount: Decimal::ZERO,
            rate: Decimal::ZERO,
        }
    }
}

/// Compute the bonus for a top-up.
///
/// Raw bonus is `amount × pct / 100`. Safaricom keeps two-decimal
/// precision; other carriers round the raw bonus half-up to the nearest
/// whole shilling (fractional part `< 0.5` down, `≥ 0.5` up).
pub fn bonus_for(carrier: Carrier, amount: Decimal, settings: &BonusSettings) -> Bonus {
    let pct = settings.pct_for(carrier);
    if pct <= Decimal::ZERO {
        return Bonus::zero();
    }
    let raw = amount * pct / dec!(100);
    let rounded = if carrier.is_home() {
        raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    } else {
        raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    };
    Bonus {
        amount: rounded,
        rate: pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn settings(safaricom: Decimal, aggregator: Decimal) -> BonusSettings {
        BonusSettings {
            safaricom_pct: safaricom,
            africastalking_pct: aggregator,
        }
    }

    #[test]
    fn home_bonus_keeps_two_decimals() {
        let bonus = bonus_for(Carrier::Safaricom, dec!(333), &settings(dec!(1.5), dec!(0)));
        assert_eq!(bonus.amount, dec!(5.00)); // 333 × 1.5% = 4.995 → 5.00
        assert_eq!(bonus.rate, dec!(1.5));

        let bonus = bonus_for(Carrier::Safaricom, dec!(100), &settings(dec!(2.25), dec!(0)));
        assert_eq!(bonus.amount, dec!(2.25));
    }

    #[test]
    fn non_home_bonus_rounds_half_up_to_whole_shillings() {
        // 100 × 2.4% = 2.40 → 2
        let bonus = bonus_for(Carrier::Airtel, dec!(100), &settings(dec!(0), dec!(2.4)));
        assert_eq!(bonus.amount, dec!(2));
        // 100 × 2.5% = 2.50 → 3
        let bonus = bonus_for(Carrier::Telkom, dec!(100), &settings(dec!(0), dec!(2.5)));
        assert_eq!(bonus.amount, dec!(3));
        // 100 × 2.6% = 2.60 → 3
        let bonus = bonus_for(Carrier::Faiba, dec!(100), &settings(dec!(0), dec!(2.6)));
        assert_eq!(bonus.amount, dec!(3));
    }

    #[test]
    fn zero_or_missing_settings_yield_zero_bonus() {
        let bonus = bonus_for(Carrier::Safaricom, dec!(1000), &BonusSettings::default());
        assert_eq!(bonus, Bonus::zero());
        let bonus = bonus_for(Carrier::Airtel, dec!(1000), &settings(dec!(5), dec!(0)));
        assert_eq!(bonus, Bonus::zero());
    }

    #[test]
    fn negative_percentages_are_treated_as_zero() {
        let bonus = bonus_for(Carrier::Safaricom, dec!(100), &settings(dec!(-1), dec!(0)));
        assert_eq!(bonus, Bonus::zero());
    }

    proptest! {
        /// Non-home rounding always lands on a whole shilling and never
        /// drifts more than half a shilling from the raw value.
        #[test]
        fn non_home_rounding_is_half_up(
            amount in 5u32..=5000,
            pct_tenths in 0u32..=100,
        ) {
            let amount = Decimal::from(amount);
            let pct = Decimal::from(pct_tenths) / dec!(10);
            let bonus = bonus_for(Carrier::Airtel, amount, &settings(dec!(0), pct));
            prop_assert_eq!(bonus.amount.fract(), Decimal::ZERO);
            let raw = amount * pct / dec!(100);
            let drift = (bonus.amount - raw).abs();
            prop_assert!(drift <= dec!(0.5));
        }

        /// Home bonus is exactly the raw product at cent precision.
        #[test]
        fn home_bonus_matches_formula(amount in 5u32..=5000, pct_tenths in 1u32..=100) {
            let amount = Decimal::from(amount);
            let pct = Decimal::from(pct_tenths) / dec!(10);
            let bonus = bonus_for(Carrier::Safaricom, amount, &settings(pct, dec!(0)));
            let raw = (amount * pct / dec!(100))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            prop_assert_eq!(bonus.amount, raw);
        }
    }
}
