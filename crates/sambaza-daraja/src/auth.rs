//! # Rail Authentication
//!
//! OAuth client-credentials token fetch and the STK push password scheme:
//! a `YYYYMMDDHHMMSS` timestamp in East Africa Time, and
//! `base64(short_code + passkey + timestamp)`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

use crate::config::DarajaConfig;
use crate::error::DarajaError;

/// East Africa Time, the rail's clock.
fn eat_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).expect("UTC+3 is a valid offset")
}

/// The push timestamp and password for a given instant.
///
/// Exposed separately from the client so the composition rule is testable
/// against fixed instants.
pub fn timestamp_and_password(
    short_code: &str,
    passkey: &str,
    at: DateTime<Utc>,
) -> (String, String) {
    let timestamp = at
        .with_timezone(&eat_offset())
        .format("%Y%m%d%H%M%S")
        .to_string();
    let password = BASE64.encode(format!("{short_code}{passkey}{timestamp}"));
    (timestamp, password)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    // The rail sends the lifetime as a string, e.g. "3599".
    expires_in: String,
}

pub(crate) struct FetchedToken {
    pub access_token: String,
    pub expires_in_secs: u64,
}

/// Fetch a bearer token with HTTP Basic against the grant endpoint.
pub(crate) async fn fetch_token(
    http: &reqwest::Client,
    config: &DarajaConfig,
) -> Result<FetchedToken, DarajaError> {
    let url = config
        .base_url
        .join("oauth/v1/generate?grant_type=client_credentials")
        .map_err(|e| DarajaError::Credential(format!("bad grant URL: {e}")))?;

    let response = http
        .get(url)
        .basic_auth(&config.consumer_key, Some(&config.consumer_secret))
        .send()
        .await
        .map_err(|e| DarajaError::Http {
            endpoint: "oauth/generate".into(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DarajaError::Api {
            endpoint: "oauth/generate".into(),
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse =
        response
            .json()
            .await
            .map_err(|e| DarajaError::Deserialization {
                endpoint: "oauth/generate".into(),
                source: e,
            })?;
    Ok(FetchedToken {
        access_token: token.access_token,
        expires_in_secs: token.expires_in.parse().unwrap_or(3600),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn password_is_base64_of_shortcode_passkey_timestamp() {
        // 2025-01-01 09:30:00 UTC is 12:30:00 EAT.
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 30, 0).unwrap();
        let (timestamp, password) = timestamp_and_password("174379", "passkey", at);
        assert_eq!(timestamp, "20250101123000");
        let decoded = BASE64.decode(password).unwrap();
        assert_eq!(decoded, b"174379passkey20250101123000");
    }

    #[test]
    fn timestamp_is_fourteen_digits() {
        let (timestamp, _) = timestamp_and_password("174379", "k", Utc::now());
        assert_eq!(timestamp.len(), 14);
        assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
    }
}
