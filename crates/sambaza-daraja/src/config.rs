//! Daraja client configuration.

use url::Url;

/// Configuration for the Daraja payment rail.
///
/// Custom `Debug` redacts every credential field so config can be logged
/// at startup without leaking secrets.
#[derive(Clone)]
pub struct DarajaConfig {
    /// Base URL of the rail (e.g. `https://api.safaricom.co.ke`).
    pub base_url: Url,
    /// OAuth consumer key.
    pub consumer_key: String,
    /// OAuth consumer secret.
    pub consumer_secret: String,
    /// Business short code collecting the payments (PartyB).
    pub short_code: String,
    /// Lipa na M-Pesa online passkey, combined with the short code and a
    /// timestamp into the push password.
    pub passkey: String,
    /// Absolute URL the rail posts the payment callback to.
    pub callback_url: Url,
    /// Initiator username for reversals.
    pub initiator_name: String,
    /// Initiator password, RSA-encrypted into the security credential.
    pub initiator_password: String,
    /// Path to the rail's public X.509 certificate (PEM).
    pub cert_path: String,
    /// Absolute URL for reversal results.
    pub reversal_result_url: Url,
    /// Absolute URL for reversal queue timeouts.
    pub reversal_timeout_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for DarajaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &"[REDACTED]")
            .field("consumer_secret", &"[REDACTED]")
            .field("short_code", &self.short_code)
            .field("passkey", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("initiator_name", &self.initiator_name)
            .field("initiator_password", &"[REDACTED]")
            .field("cert_path", &self.cert_path)
            .field("reversal_result_url", &self.reversal_result_url)
            .field("reversal_timeout_url", &self.reversal_timeout_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
