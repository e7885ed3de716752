//! Per-version outcomes and the per-source report.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::source::Channel;

/// Why a version has no download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The upstream listed zero builds.
    NoBuilds,
    /// Fetching builds failed after retries.
    FetchFailed,
    /// A bounded wait (request or page-ready) elapsed.
    Timeout,
    /// A build was selected but no URL could be composed from it.
    NoArtifactMatch,
}

impl UnresolvedReason {
    /// Stable snake_case tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoBuilds => "no_builds",
            Self::FetchFailed => "fetch_failed",
            Self::Timeout => "timeout",
            Self::NoArtifactMatch => "no_artifact_match",
        }
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A version resolved to a download URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub version: String,
    pub channel: Channel,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
}

/// A version that could not be resolved, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    pub version: String,
    pub channel: Channel,
    pub reason: UnresolvedReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Resolved entries keyed by channel, then version, in discovery order.
///
/// Only resolved versions live here; unresolved ones are reported separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMapping {
    channels: IndexMap<Channel, IndexMap<String, ResolvedEntry>>,
}

impl ResultMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`, replacing any previous entry for the same version.
    pub fn insert(&mut self, entry: ResolvedEntry) {
        self.channels
            .entry(entry.channel)
            .or_default()
            .insert(entry.version.clone(), entry);
    }

    /// Looks up a resolved version.
    #[must_use]
    pub fn get(&self, channel: Channel, version: &str) -> Option<&ResolvedEntry> {
        self.channels.get(&channel)?.get(version)
    }

    /// Whether `version` is resolved under any channel.
    #[must_use]
    pub fn contains_version(&self, version: &str) -> bool {
        self.channels.values().any(|m| m.contains_key(version))
    }

    /// `version -> url` for one channel, in discovery order.
    #[must_use]
    pub fn urls(&self, channel: Channel) -> IndexMap<&str, &str> {
        self.channels
            .get(&channel)
            .map(|m| {
                m.values()
                    .map(|e| (e.version.as_str(), e.url.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `version -> url` across all channels, in discovery order per channel.
    #[must_use]
    pub fn all_urls(&self) -> IndexMap<&str, &str> {
        self.channels
            .values()
            .flat_map(IndexMap::values)
            .map(|e| (e.version.as_str(), e.url.as_str()))
            .collect()
    }

    /// Iterates every resolved entry.
    pub fn entries(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.channels.values().flat_map(IndexMap::values)
    }

    /// Number of resolved versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.values().map(IndexMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Full accounting of one source run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    /// Source name, used for output naming.
    pub source: String,
    /// Whether output is split by channel.
    pub partitioned: bool,
    /// Resolved versions.
    pub mapping: ResultMapping,
    /// Unresolved versions with reasons.
    pub unresolved: Vec<UnresolvedEntry>,
    /// Retries spent across all requests of the run.
    pub retries: u32,
    /// True when the run stopped early on cancellation.
    pub cancelled: bool,
    /// Versions enumerated but not visited because of cancellation.
    pub pending: usize,
}

impl SourceReport {
    /// Empty report for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>, partitioned: bool) -> Self {
        Self {
            source: source.into(),
            partitioned,
            mapping: ResultMapping::new(),
            unresolved: Vec::new(),
            retries: 0,
            cancelled: false,
            pending: 0,
        }
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.mapping.len()
    }

    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    /// Unresolved entries carrying `reason`.
    pub fn unresolved_with(&self, reason: UnresolvedReason) -> impl Iterator<Item = &UnresolvedEntry> {
        self.unresolved.iter().filter(move |u| u.reason == reason)
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} resolved, {} unresolved",
            self.source,
            self.resolved_count(),
            self.unresolved_count()
        )?;
        if self.retries > 0 {
            write!(f, ", {} retries", self.retries)?;
        }
        if self.cancelled {
            write!(f, " (cancelled, {} pending)", self.pending)?;
        }
        Ok(())
    }
}
