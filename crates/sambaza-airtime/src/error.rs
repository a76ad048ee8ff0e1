//! Airtime provider error types.

use thiserror::Error;

use sambaza_core::ProviderKind;

/// Errors from airtime dispatch calls.
#[derive(Debug, Error)]
pub enum AirtimeError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// The logical endpoint being called.
        endpoint: String,
        /// Underlying transport failure.
        source: reqwest::Error,
    },

    /// The provider returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        /// The logical endpoint being called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        /// The logical endpoint being called.
        endpoint: String,
        /// Underlying serde failure.
        source: reqwest::Error,
    },

    /// The provider answered but did not deliver.
    #[error("{provider} refused the dispatch: {detail}")]
    Refused {
        /// Which provider refused.
        provider: ProviderKind,
        /// The provider's response, verbatim, for the error log.
        detail: serde_json::Value,
    },

    /// Credentials could not be obtained (token grant, missing PIN).
    #[error("credential error: {0}")]
    Credential(String),

    /// The amount cannot be expressed in the provider's units.
    #[error("amount error: {0}")]
    Amount(#[from] sambaza_core::AmountError),
}
