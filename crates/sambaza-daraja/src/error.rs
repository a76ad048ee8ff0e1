//! Daraja client error types.

use thiserror::Error;

/// Errors from Daraja calls.
#[derive(Debug, Error)]
pub enum DarajaError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// The logical endpoint being called.
        endpoint: String,
        /// Underlying transport failure.
        source: reqwest::Error,
    },

    /// The rail returned a non-2xx status.
    #[error("Daraja {endpoint} returned {status}: {body}")]
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

    /// The rail accepted the HTTP call but rejected the request.
    #[error("Daraja rejected the request (code {code}): {description}")]
    Rejected {
        /// The rail's response code.
        code: String,
        /// The rail's description.
        description: String,
    },

    /// The security credential could not be prepared.
    #[error("security credential error: {0}")]
    Credential(String),

    /// The rail only accepts whole-shilling amounts.
    #[error("amount {0} is not a whole number of shillings")]
    FractionalAmount(rust_decimal::Decimal),
}
