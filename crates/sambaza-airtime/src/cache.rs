//! # Time-Bounded Credential Cache
//!
//! One slot, one TTL, single-flight refresh: the fetch runs under the
//! slot's lock, so concurrent users of an expired credential wait for one
//! refresh instead of stampeding the upstream. Process-local only —
//! credentials are never persisted.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// A single cached value with an expiry.
#[derive(Debug, Default)]
pub struct TtlCell<T> {
    slot: Mutex<Option<(T, Instant)>>,
}

impl<T: Clone> TtlCell<T> {
    /// An empty cell.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// The cached value, or the result of `fetch` stored for `ttl`.
    ///
    /// `fetch` decides the TTL because some upstreams advertise a
    /// lifetime per credential.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(T, Duration), E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((value, expires_at)) = slot.as_ref() {
            if *expires_at > Instant::now() {
                return Ok(value.clone());
            }
        }
        let (value, ttl) = fetch().await?;
        *slot = Some((value.clone(), Instant::now() + ttl));
        Ok(value)
    }

    /// Drop the cached value, forcing the next caller to fetch.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn caches_until_ttl_and_refetches_after() {
        let cell = TtlCell::new();
        let fetches = AtomicU32::new(0);

        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(("credential".to_string(), Duration::from_millis(20)))
        };

        assert_eq!(cell.get_or_fetch(fetch).await.unwrap(), "credential");
        assert_eq!(cell.get_or_fetch(fetch).await.unwrap(), "credential");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cell.get_or_fetch(fetch).await.unwrap(), "credential");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_errors_are_not_cached() {
        let cell: TtlCell<String> = TtlCell::new();
        let result = cell
            .get_or_fetch(|| async { Err::<(String, Duration), _>("down") })
            .await;
        assert_eq!(result.unwrap_err(), "down");

        let recovered = cell
            .get_or_fetch(|| async {
                Ok::<_, &str>(("ok".to_string(), Duration::from_secs(1)))
            })
            .await;
        assert_eq!(recovered.unwrap(), "ok");
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let cell = TtlCell::new();
        let fetches = AtomicU32::new(0);
        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>((1u8, Duration::from_secs(60)))
        };
        cell.get_or_fetch(fetch).await.unwrap();
        cell.invalidate().await;
        cell.get_or_fetch(fetch).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
