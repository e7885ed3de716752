//! Resolution pipeline: drives one source adapter from enumeration to a report.
//!
//! ```text
//! Idle -> EnumeratingVersions
//!      -> per version: FetchingBuilds -> Selecting -> Composing -> Recording
//!      -> Draining -> Done
//! ```
//!
//! An empty build list goes straight from `FetchingBuilds` to `Recording`.
//! Only enumeration failure aborts a run; everything that goes wrong for a
//! single version is recorded against that version and the run moves on.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::compose::compose;
use super::error::PipelineError;
use super::outcome::{ResolvedEntry, SourceReport, UnresolvedEntry, UnresolvedReason};
use super::select::select_latest;
use crate::source::{SourceAccess, SourceAdapter, SourceContext, VersionEntry};
use crate::transport::{
    DEFAULT_THROTTLE_DELAY, FailureType, FetchError, RetryDecision, RetryPolicy, Throttle,
    classify_error, parse_retry_after,
};

/// Default upper bound for a listing page to become ready.
pub const DEFAULT_PAGE_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Phases of a source run, logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    EnumeratingVersions,
    FetchingBuilds,
    Selecting,
    Composing,
    Recording,
    Draining,
    Done,
}

/// Tunables for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Retry policy applied to every adapter call.
    pub retry_policy: RetryPolicy,
    /// Minimum spacing between navigations for scrape sources.
    pub throttle_delay: Duration,
    /// Page-ready wait bound for scrape sources.
    pub page_ready_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            throttle_delay: DEFAULT_THROTTLE_DELAY,
            page_ready_timeout: DEFAULT_PAGE_READY_TIMEOUT,
        }
    }
}

/// Shared resolution algorithm for every source.
///
/// One pipeline value can run many sources, but each [`run`](Self::run)
/// builds its own throttle and context, so concurrent runs share nothing
/// except the cancellation flag.
#[derive(Debug, Clone)]
pub struct ResolutionPipeline {
    options: PipelineOptions,
    cancel: Arc<AtomicBool>,
}

impl ResolutionPipeline {
    /// Creates a pipeline with its own (never set) cancellation flag.
    #[must_use]
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` as the external cancellation signal.
    ///
    /// The flag is checked between versions; a set flag stops the run after
    /// the version in flight and the report is marked cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Runs `adapter` to completion and releases it on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SourceUnavailable`] when version enumeration
    /// fails after retries.
    #[instrument(skip_all, fields(source = adapter.name()))]
    pub async fn run(&self, adapter: &dyn SourceAdapter) -> Result<SourceReport, PipelineError> {
        let result = self.drive(adapter).await;
        adapter.release().await;
        debug!("source released");
        result
    }

    async fn drive(&self, adapter: &dyn SourceAdapter) -> Result<SourceReport, PipelineError> {
        let mut report = SourceReport::new(adapter.name(), adapter.partitions_channels());
        let mut state = PipelineState::Idle;

        let throttle = match adapter.access() {
            SourceAccess::Scrape => Throttle::new(self.options.throttle_delay),
            SourceAccess::Api => Throttle::disabled(),
        };
        let ctx = SourceContext::new(Arc::new(throttle), self.options.page_ready_timeout);

        if self.is_cancelled() {
            warn!("cancelled before enumeration");
            report.cancelled = true;
            transition(&mut state, PipelineState::Done);
            return Ok(report);
        }

        transition(&mut state, PipelineState::EnumeratingVersions);
        let versions = self
            .with_retry(&ctx, &mut report.retries, adapter.index_url(), || {
                adapter.list_versions(&ctx)
            })
            .await
            .map_err(|e| PipelineError::source_unavailable(adapter.name(), e))?;
        let versions = dedup_versions(versions);
        info!(count = versions.len(), "versions enumerated");

        for (index, entry) in versions.iter().enumerate() {
            if self.is_cancelled() {
                report.cancelled = true;
                report.pending = versions.len() - index;
                warn!(pending = report.pending, "cancellation requested; stopping");
                break;
            }
            self.resolve_version(adapter, entry, &ctx, &mut state, &mut report)
                .await;
        }

        transition(&mut state, PipelineState::Draining);
        info!(
            resolved = report.resolved_count(),
            unresolved = report.unresolved_count(),
            retries = report.retries,
            cancelled = report.cancelled,
            "source run finished"
        );
        transition(&mut state, PipelineState::Done);
        Ok(report)
    }

    #[instrument(skip_all, fields(version = %entry.version, channel = %entry.channel))]
    async fn resolve_version(
        &self,
        adapter: &dyn SourceAdapter,
        entry: &VersionEntry,
        ctx: &SourceContext,
        state: &mut PipelineState,
        report: &mut SourceReport,
    ) {
        transition(state, PipelineState::FetchingBuilds);
        let fetched = self
            .with_retry(ctx, &mut report.retries, &entry.locator, || {
                adapter.list_builds(entry, ctx)
            })
            .await;

        let builds = match fetched {
            Ok(builds) => builds,
            Err(e) => {
                let reason = if e.is_timeout() {
                    UnresolvedReason::Timeout
                } else {
                    UnresolvedReason::FetchFailed
                };
                transition(state, PipelineState::Recording);
                record_unresolved(report, entry, reason, Some(e.to_string()));
                return;
            }
        };

        if builds.is_empty() {
            transition(state, PipelineState::Recording);
            record_unresolved(report, entry, UnresolvedReason::NoBuilds, None);
            return;
        }

        transition(state, PipelineState::Selecting);
        let Some(selected) = select_latest(&builds) else {
            transition(state, PipelineState::Recording);
            record_unresolved(report, entry, UnresolvedReason::NoBuilds, None);
            return;
        };

        transition(state, PipelineState::Composing);
        let composed = compose(&entry.version, selected, adapter.url_rule());

        transition(state, PipelineState::Recording);
        match composed {
            Ok(url) => {
                debug!(%url, build = ?selected.build_number, "resolved");
                report.mapping.insert(ResolvedEntry {
                    version: entry.version.clone(),
                    channel: entry.channel,
                    url,
                    build_number: selected.build_number,
                });
            }
            Err(e) => record_unresolved(
                report,
                entry,
                UnresolvedReason::NoArtifactMatch,
                Some(e.to_string()),
            ),
        }
    }

    /// Runs `op` under the retry policy, honoring upstream Retry-After hints.
    async fn with_retry<T, F, Fut>(
        &self,
        ctx: &SourceContext,
        retries: &mut u32,
        upstream: &str,
        mut op: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let policy = &self.options.retry_policy;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let failure_type = classify_error(&error);
            let retry_after = if failure_type == FailureType::RateLimited {
                error.retry_after().and_then(parse_retry_after)
            } else {
                None
            };
            if let Some(delay) = retry_after {
                ctx.throttle().record_rate_limit(upstream, delay);
            }

            match policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let delay = retry_after.unwrap_or(backoff_delay);
                    info!(
                        upstream,
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = retry_after.is_some(),
                        error = %error,
                        "retrying upstream request"
                    );
                    *retries += 1;
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(upstream, %reason, error = %error, "giving up on upstream request");
                    return Err(error);
                }
            }
        }
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?*state, to = ?next, "pipeline state");
    *state = next;
}

fn record_unresolved(
    report: &mut SourceReport,
    entry: &VersionEntry,
    reason: UnresolvedReason,
    detail: Option<String>,
) {
    warn!(
        version = %entry.version,
        %reason,
        detail = detail.as_deref().unwrap_or(""),
        "version unresolved"
    );
    report.unresolved.push(UnresolvedEntry {
        version: entry.version.clone(),
        channel: entry.channel,
        reason,
        detail,
    });
}

/// Drops repeated version ids, keeping the first occurrence.
fn dedup_versions(versions: Vec<VersionEntry>) -> Vec<VersionEntry> {
    let mut seen = HashSet::new();
    versions
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.version.clone());
            if !fresh {
                debug!(version = %entry.version, "duplicate version in enumeration; skipped");
            }
            fresh
        })
        .collect()
}
