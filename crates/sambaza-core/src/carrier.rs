//! # Carrier Classification
//!
//! Maps a destination MSISDN to its mobile network operator by the three
//! national digits after the leading zero. Prefix allocations change rarely
//! enough that the sets ship as code constants.

use serde::{Deserialize, Serialize};

use crate::msisdn::Msisdn;

/// Safaricom national prefixes (07xx and 011x series).
const SAFARICOM_PREFIXES: &[&str] = &[
    "110", "111", "112", "113", "114", "115", // 01xx series
    "700", "701", "702", "703", "704", "705", "706", "707", "708", "709", "710", "711", "712",
    "713", "714", "715", "716", "717", "718", "719", "720", "721", "722", "723", "724", "725",
    "726", "727", "728", "729", "740", "741", "742", "743", "745", "746", "748", "757", "758",
    "759", "768", "769", "790", "791", "792", "793", "794", "795", "796", "797", "798", "799",
];

/// Airtel national prefixes (010x and 07xx series).
const AIRTEL_PREFIXES: &[&str] = &[
    "100", "101", "102", "103", "104", "105", "106", // 01xx series
    "730", "731", "732", "733", "734", "735", "736", "737", "738", "739", "750", "751", "752",
    "753", "754", "755", "756", "785", "786", "787", "788", "789",
];

/// Telkom Kenya national prefixes.
const TELKOM_PREFIXES: &[&str] = &[
    "770", "771", "772", "773", "774", "775", "776", "777", "778", "779",
];

/// Equitel (Finserve MVNO) national prefixes.
const EQUITEL_PREFIXES: &[&str] = &["763", "764", "765"];

/// Faiba 4G (Jamii Telecom) national prefixes.
const FAIBA_PREFIXES: &[&str] = &["747"];

/// A Kenyan mobile network operator, as resolved from a destination number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    /// Safaricom — the home telco whose payment rail collects the money
    /// and whose dealer API dispatches airtime directly.
    Safaricom,
    /// Airtel Kenya.
    Airtel,
    /// Telkom Kenya.
    Telkom,
    /// Equitel, Equity Bank's virtual operator.
    Equitel,
    /// Faiba 4G mobile.
    Faiba,
    /// No prefix set claims this number. Unsupported for top-ups.
    Unknown,
}

impl Carrier {
    /// Classify a destination number by its national prefix.
    pub fn of(msisdn: &Msisdn) -> Self {
        let prefix = msisdn.national_prefix();
        if SAFARICOM_PREFIXES.contains(&prefix) {
            Carrier::Safaricom
        } else if AIRTEL_PREFIXES.contains(&prefix) {
            Carrier::Airtel
        } else if TELKOM_PREFIXES.contains(&prefix) {
            Carrier::Telkom
        } else if EQUITEL_PREFIXES.contains(&prefix) {
            Carrier::Equitel
        } else if FAIBA_PREFIXES.contains(&prefix) {
            Carrier::Faiba
        } else {
            Carrier::Unknown
        }
    }

    /// Classify a raw destination string; unparseable input is `Unknown`.
    pub fn of_raw(raw: &str) -> Self {
        match Msisdn::parse(raw) {
            Ok(msisdn) => Self::of(&msisdn),
            Err(_) => Carrier::Unknown,
        }
    }

    /// Whether the gateway can deliver airtime to this carrier.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Carrier::Unknown)
    }

    /// Whether this is the home telco served by the dealer-direct API.
    pub fn is_home(&self) -> bool {
        matches!(self, Carrier::Safaricom)
    }

    /// Canonical lowercase name, as persisted and reported.
    pub fn as_str(&self) -> &'static str {
        match self {
            Carrier::Safaricom => "safaricom",
            Carrier::Airtel => "airtel",
            Carrier::Telkom => "telkom",
            Carrier::Equitel => "equitel",
            Carrier::Faiba => "faiba",
            Carrier::Unknown => "unknown",
        }
    }

    /// Every defined prefix set, for exhaustive tests and diagnostics.
    pub fn prefix_table() -> &'static [(Carrier, &'static [&'static str])] {
        &[
            (Carrier::Safaricom, SAFARICOM_PREFIXES),
            (Carrier::Airtel, AIRTEL_PREFIXES),
            (Carrier::Telkom, TELKOM_PREFIXES),
            (Carrier::Equitel, EQUITEL_PREFIXES),
            (Carrier::Faiba, FAIBA_PREFIXES),
        ]
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn every_defined_prefix_classifies_to_its_carrier() {
        for (carrier, prefixes) in Carrier::prefix_table() {
            for prefix in *prefixes {
                let number = format!("0{prefix}123456");
                assert_eq!(Carrier::of_raw(&number), *carrier, "prefix {prefix}");
            }
        }
    }

    #[test]
    fn prefix_sets_are_disjoint() {
        let mut seen = std::collections::HashSet::new();
        for (_, prefixes) in Carrier::prefix_table() {
            for prefix in *prefixes {
                assert!(seen.insert(*prefix), "prefix {prefix} appears twice");
            }
        }
    }

    #[test]
    fn classification_is_input_shape_independent() {
        assert_eq!(Carrier::of_raw("+254712345678"), Carrier::Safaricom);
        assert_eq!(Carrier::of_raw("254733000000"), Carrier::Airtel);
        assert_eq!(Carrier::of_raw("0770123456"), Carrier::Telkom);
        assert_eq!(Carrier::of_raw("0763000111"), Carrier::Equitel);
        assert_eq!(Carrier::of_raw("0747555000"), Carrier::Faiba);
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(Carrier::of_raw("not-a-phone"), Carrier::Unknown);
        assert_eq!(Carrier::of_raw(""), Carrier::Unknown);
        assert_eq!(Carrier::of_raw("0666123456"), Carrier::Unknown);
    }

    proptest! {
        /// A prefix outside every defined set classifies as Unknown.
        #[test]
        fn undefined_prefixes_are_unknown(prefix in "[0-9]{3}", suffix in "[0-9]{6}") {
            let defined = Carrier::prefix_table()
                .iter()
                .any(|(_, set)| set.contains(&prefix.as_str()));
            prop_assume!(!defined);
            prop_assert_eq!(Carrier::of_raw(&format!("0{prefix}{suffix}")), Carrier::Unknown);
        }
    }
}
