use std::collections::HashMap;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use digester_logging::digester_trace;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::Fetcher;
use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

/// Enforces a minimum interval between requests to the same host.
///
/// Each host maps to the instant its most recently admitted request may
/// fire. Reading that slot and reserving the next one happen under one lock,
/// so concurrent callers queue up instead of both seeing an idle host.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    slots: Mutex<HashMap<String, Instant>>,
}

#[derive(Debug, Clone, Copy)]
struct Reservation {
    previous: Instant,
    slot: Instant,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend until a request to `url`'s host is allowed.
    ///
    /// The first request to a host never waits. A cancelled wait returns
    /// `FailureKind::Cancelled` and hands its reserved slot back.
    pub async fn wait(&self, url: &str, cancel: &CancellationToken) -> Result<(), FetchError> {
        let host = host_key(url)?;
        if cancel.is_cancelled() {
            return Err(FetchError::cancelled());
        }

        let Some(reservation) = self.reserve(&host) else {
            return Ok(());
        };

        digester_trace!(
            "rate limit: waiting {:?} before request to {}",
            reservation.slot.saturating_duration_since(Instant::now()),
            host
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.release(&host, reservation);
                Err(FetchError::cancelled())
            }
            _ = tokio::time::sleep_until(reservation.slot) => Ok(()),
        }
    }

    /// Returns `None` when the request may go out immediately.
    fn reserve(&self, host: &str) -> Option<Reservation> {
        let mut slots = self.lock();
        let now = Instant::now();
        match slots.get(host).copied() {
            Some(previous) if now < previous + self.min_interval => {
                let slot = previous + self.min_interval;
                slots.insert(host.to_string(), slot);
                Some(Reservation { previous, slot })
            }
            _ => {
                slots.insert(host.to_string(), now);
                None
            }
        }
    }

    fn release(&self, host: &str, reservation: Reservation) {
        let mut slots = self.lock();
        // Only roll back if nobody queued behind us.
        if slots.get(host) == Some(&reservation.slot) {
            slots.insert(host.to_string(), reservation.previous);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn host_key(url: &str) -> Result<String, FetchError> {
    let parsed =
        Url::parse(url).map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    parsed
        .host_str()
        .map(|host| host.to_ascii_lowercase())
        .ok_or_else(|| FetchError::new(FailureKind::InvalidUrl, format!("no host in {url}")))
}

/// Wraps any [`Fetcher`] with per-host throttling.
#[derive(Debug)]
pub struct LimitedFetcher<F> {
    inner: F,
    limiter: RateLimiter,
}

impl<F: Fetcher> LimitedFetcher<F> {
    pub fn new(inner: F, min_interval: Duration) -> Self {
        Self {
            inner,
            limiter: RateLimiter::new(min_interval),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<F: Fetcher> Fetcher for LimitedFetcher<F> {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchOutput, FetchError> {
        self.limiter.wait(url, cancel).await?;
        self.inner.fetch(url, cancel).await
    }

    async fn fetch_as_string(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        self.limiter.wait(url, cancel).await?;
        self.inner.fetch_as_string(url, cancel).await
    }

    async fn stream(
        &self,
        url: &str,
        sink: &mut (dyn Write + Send),
        cancel: &CancellationToken,
    ) -> Result<FetchMetadata, FetchError> {
        self.limiter.wait(url, cancel).await?;
        self.inner.stream(url, sink, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::host_key;

    #[test]
    fn host_key_is_lowercase_hostname() {
        assert_eq!(host_key("https://News.Example.COM:8443/a?b").unwrap(), "news.example.com");
        assert!(host_key("mailto:someone@example.com").is_err());
        assert!(host_key("not a url").is_err());
    }
}
