//! # MSISDN Normalization
//!
//! A Kenyan subscriber number is written four ways in the wild:
//! `+254712345678`, `254712345678`, `0712345678`, and `712345678`. Every
//! upstream wants a different one. [`Msisdn`] parses any of the four into
//! the canonical ten-digit national form and renders whichever variant an
//! upstream expects.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kenya's E.164 country code, without the `+`.
const COUNTRY_CODE: &str = "254";

/// A validated Kenyan subscriber number in ten-digit national form (`07…`/`01…`).
///
/// Construction goes through [`Msisdn::parse`], which fails loudly on any
/// input it cannot coerce to exactly ten national digits. Everything past
/// the boundary can trust the shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Msisdn(String);

/// Errors from MSISDN parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MsisdnError {
    /// Input contained characters other than digits, `+`, spaces, or hyphens.
    #[error("phone number contains non-digit characters: {0:?}")]
    NonDigit(String),

    /// Input could not be coerced to a ten-digit national number.
    #[error("phone number has unrecognized shape: {0:?}")]
    BadShape(String),
}

impl Msisdn {
    /// Parse a phone number in any accepted form.
    ///
    /// Accepted shapes: `+254XXXXXXXXX`, `254XXXXXXXXX`, `0XXXXXXXXX`, and
    /// the bare nine-digit `XXXXXXXXX` where the first digit is `1` or `7`.
    /// Spaces and hyphens are ignored.
    pub fn parse(raw: &str) -> Result<Self, MsisdnError> {
        let trimmed: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let digits = trimmed.strip_prefix('+').unwrap_or(&trimmed);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(MsisdnError::NonDigit(raw.to_string()));
        }

        let national = if let Some(rest) = digits.strip_prefix(COUNTRY_CODE) {
            // 254XXXXXXXXX → 0XXXXXXXXX
            if rest.len() == 9 {
                format!("0{rest}")
            } else {
                return Err(MsisdnError::BadShape(raw.to_string()));
            }
        } else if digits.len() == 10 && digits.starts_with('0') {
            digits.to_string()
        } else if digits.len() == 9 && (digits.starts_with('7') || digits.starts_with('1')) {
            format!("0{digits}")
        } else {
            return Err(MsisdnError::BadShape(raw.to_string()));
        };

        debug_assert_eq!(national.len(), 10);
        Ok(Self(national))
    }

    /// Ten-digit national form: `0712345678`.
    pub fn national(&self) -> &str {
        &self.0
    }

    /// Nine digits, no leading zero, no country code: `712345678`.
    ///
    /// This is the form the dealer-direct airtime API expects.
    pub fn dealer(&self) -> &str {
        &self.0[1..]
    }

    /// International form without `+`: `254712345678`. Used by the payment rail.
    pub fn international(&self) -> String {
        format!("{COUNTRY_CODE}{}", &self.0[1..])
    }

    /// E.164 form with `+`: `+254712345678`. Used by the aggregator.
    pub fn e164(&self) -> String {
        format!("+{COUNTRY_CODE}{}", &self.0[1..])
    }

    /// The three digits following the leading zero, used for carrier lookup.
    pub fn national_prefix(&self) -> &str {
        &self.0[1..4]
    }
}

impl std::fmt::Display for Msisdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Msisdn {
    type Error = MsisdnError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Msisdn> for String {
    fn from(msisdn: Msisdn) -> Self {
        msisdn.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_all_four_input_shapes() {
        for raw in [
            "+254712345678",
            "254712345678",
            "0712345678",
            "712345678",
        ] {
            let msisdn = Msisdn::parse(raw).unwrap();
            assert_eq!(msisdn.national(), "0712345678", "input {raw:?}");
        }
    }

    #[test]
    fn renders_every_upstream_variant() {
        let msisdn = Msisdn::parse("0712345678").unwrap();
        assert_eq!(msisdn.dealer(), "712345678");
        assert_eq!(msisdn.international(), "254712345678");
        assert_eq!(msisdn.e164(), "+254712345678");
        assert_eq!(msisdn.national_prefix(), "712");
    }

    #[test]
    fn tolerates_spaces_and_hyphens() {
        let msisdn = Msisdn::parse("+254 712-345-678").unwrap();
        assert_eq!(msisdn.national(), "0712345678");
    }

    #[test]
    fn accepts_one_series() {
        let msisdn = Msisdn::parse("0110123456").unwrap();
        assert_eq!(msisdn.national(), "0110123456");
        assert_eq!(msisdn.e164(), "+254110123456");
    }

    #[test]
    fn rejects_malformed_numbers() {
        for raw in ["", "07123", "07123456789", "25571234567", "phone", "2547123456789"] {
            assert!(Msisdn::parse(raw).is_err(), "input {raw:?} should fail");
        }
    }

    proptest! {
        /// Any nine-digit subscriber part round-trips identically through
        /// all four input forms.
        #[test]
        fn round_trip_is_stable(subscriber in "[17][0-9]{8}") {
            let from_plus = Msisdn::parse(&format!("+254{subscriber}")).unwrap();
            let from_intl = Msisdn::parse(&format!("254{subscriber}")).unwrap();
            let from_national = Msisdn::parse(&format!("0{subscriber}")).unwrap();
            let from_bare = Msisdn::parse(&subscriber).unwrap();
            prop_assert_eq!(&from_plus, &from_intl);
            prop_assert_eq!(&from_plus, &from_national);
            prop_assert_eq!(&from_plus, &from_bare);
            prop_assert_eq!(from_plus.dealer(), subscriber);
        }
    }
}
