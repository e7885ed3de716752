//! Per-host navigation throttle for scrape-based sources.
//!
//! Directory-listing upstreams rate-limit aggressive crawlers, so after each
//! page load a host gets a fixed quiet period before the next navigation.
//! API sources get a disabled throttle and never wait.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use jarcrawler_core::transport::Throttle;
//!
//! # async fn example() {
//! let throttle = Throttle::new(Duration::from_secs(5));
//!
//! // First navigation proceeds immediately
//! throttle.acquire("https://files.mcjars.app/spigot/").await;
//! // ... load the page ...
//! throttle.complete("https://files.mcjars.app/spigot/").await;
//!
//! // Next navigation to the same host waits until 5s after that load ended
//! throttle.acquire("https://files.mcjars.app/spigot/1.20.4/").await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Default delay between navigations to one host.
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(5);

/// Warning threshold for cumulative delay per host.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(300);

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Per-host quiet period between the end of one page load and the next navigation.
///
/// Wrapped in `Arc` by the pipeline and handed to adapters through the
/// source context. Per-host state lives behind a `tokio::sync::Mutex` so the
/// read-wait-update cycle is atomic even if a caller shares the throttle.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    disabled: bool,
    /// Arc'd so the `DashMap` shard lock is released before awaiting.
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug)]
struct HostState {
    /// End of the last page load (start, while one is in flight).
    /// `None` until the first navigation, which is never delayed.
    last_navigation: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl HostState {
    fn new() -> Self {
        Self {
            last_navigation: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

impl Throttle {
    /// Creates a throttle with the given minimum delay per host.
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = delay.as_millis()))]
    pub fn new(delay: Duration) -> Self {
        debug!("creating navigation throttle");
        Self {
            delay,
            disabled: delay.is_zero(),
            hosts: DashMap::new(),
        }
    }

    /// Creates a throttle that never waits (API sources).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            delay: Duration::ZERO,
            disabled: true,
            hosts: DashMap::new(),
        }
    }

    /// Returns whether throttling is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured minimum delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until the host's quiet period after its last page load has
    /// passed, then marks a navigation as started.
    ///
    /// Pair every call with [`Throttle::complete`] once the page finished
    /// loading, whether or not the load succeeded.
    #[instrument(skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let host = extract_host(url);
        tracing::Span::current().record("host", &host);

        let state = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostState::new()))
            .clone();

        let mut last_guard = state.last_navigation.lock().await;

        if let Some(last) = *last_guard {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                let wait = self.delay.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(wait);

                debug!(
                    host = %host,
                    delay_ms = wait.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "throttling navigation"
                );

                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        host = %host,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "long cumulative throttle delay for host"
                    );
                }

                tokio::time::sleep(wait).await;
            }
        } else {
            debug!(host = %host, "first navigation to host - no delay");
        }

        *last_guard = Some(Instant::now());
    }

    /// Records that the page load on `url`'s host finished; the next
    /// [`Throttle::acquire`] for that host waits the full delay from now.
    #[instrument(skip(self), fields(host))]
    pub async fn complete(&self, url: &str) {
        if self.disabled {
            return;
        }

        let host = extract_host(url);
        tracing::Span::current().record("host", &host);

        let state = self
            .hosts
            .entry(host)
            .or_insert_with(|| Arc::new(HostState::new()))
            .clone();
        *state.last_navigation.lock().await = Some(Instant::now());
    }

    /// Total time spent waiting on (or told to wait by) `url`'s host so far.
    #[must_use]
    pub fn cumulative_delay(&self, url: &str) -> Duration {
        self.hosts
            .get(&extract_host(url))
            .map_or(Duration::ZERO, |state| {
                Duration::from_millis(state.cumulative_delay_ms.load(Ordering::SeqCst))
            })
    }

    /// Records a server-mandated delay (from a Retry-After header) for `url`'s host.
    #[instrument(skip(self), fields(host))]
    pub fn record_rate_limit(&self, url: &str, delay: Duration) {
        let host = extract_host(url);
        tracing::Span::current().record("host", &host);

        let state = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostState::new()));
        let cumulative = state.add_cumulative_delay(delay);

        debug!(
            host = %host,
            delay_ms = delay.as_millis(),
            cumulative_ms = cumulative.as_millis(),
            "recorded upstream rate limit"
        );
    }
}

/// Extracts the lowercase host from a URL, or `"unknown"` for malformed input.
///
/// ```
/// use jarcrawler_core::transport::throttle::extract_host;
///
/// assert_eq!(extract_host("https://Files.MCJars.app/spigot/"), "files.mcjars.app");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds and HTTP-date (RFC 7231). Returns `None` if the
/// value cannot be parsed. Caps excessive values at 1 hour.
///
/// ```
/// use std::time::Duration;
/// use jarcrawler_core::transport::throttle::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(duration.min(MAX_RETRY_AFTER));
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        match datetime.duration_since(now) {
            Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
            // Date is in the past
            Err(_) => Some(Duration::ZERO),
        }
    } else {
        debug!(header_value, "unparseable Retry-After value");
        None
    }
}
