//! Upstream source adapters.
//!
//! Every upstream (release API or scraped directory listing) implements
//! [`SourceAdapter`]: it enumerates versions and, per version, lists the
//! candidate builds it exposes. The resolution pipeline depends only on the
//! trait, never on a concrete source.
//!
//! # Adapters
//!
//! - [`ManifestSource`] - flat manifest plus per-version asset lookup (vanilla)
//! - [`BuildApiSource`] - per-version builds endpoint with numeric builds (paper)
//! - [`TagRegistrySource`] - tag-filtered artifact registry (sponge)
//! - [`DirectoryListingSource`] - HTML directory listing via a [`PageSession`] (spigot)
//! - [`InstallerIndexSource`] - scraped version index and per-version download page (forge)
//! - [`LoaderTemplateSource`] - templated server jar per game version (fabric)

mod build_api;
mod directory;
mod installer_index;
mod loader_template;
mod manifest;
mod session;
mod tag_registry;

pub use build_api::BuildApiSource;
pub use directory::DirectoryListingSource;
pub use installer_index::InstallerIndexSource;
pub use loader_template::LoaderTemplateSource;
pub use manifest::ManifestSource;
pub use session::{
    HttpPageSession, ListingRow, PageDocument, PageListing, PageSession, parse_listing_rows,
};
pub use tag_registry::TagRegistrySource;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::resolve::UrlRule;
use crate::transport::{FetchError, HttpClient, Throttle};

/// Release classification of a version; partitions the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Regular releases.
    Stable,
    /// Snapshots, pre-releases and other unstable builds.
    Unstable,
}

impl Channel {
    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Unstable => "unstable",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One version discovered during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    /// Opaque version identifier (e.g. `1.20.4`).
    pub version: String,
    /// Release channel.
    pub channel: Channel,
    /// Adapter-specific handle used to list builds (usually a URL).
    pub locator: String,
}

impl VersionEntry {
    /// Creates a new version entry.
    #[must_use]
    pub fn new(version: impl Into<String>, channel: Channel, locator: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            channel,
            locator: locator.into(),
        }
    }
}

/// One discrete artifact instance exposed for a version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildCandidate {
    /// Ordinal build number, when the upstream has one.
    pub build_number: Option<u64>,
    /// Artifact file name or identifier, when the upstream has one.
    pub file_name: Option<String>,
    /// Location (URL or directory) the artifact resolves from.
    pub location: Option<String>,
}

impl BuildCandidate {
    /// Candidate with only a numeric build.
    #[must_use]
    pub fn numbered(build_number: u64) -> Self {
        Self {
            build_number: Some(build_number),
            ..Self::default()
        }
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// How an adapter reaches its upstream; drives throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAccess {
    /// Structured API; no inter-request throttle.
    Api,
    /// Scraped pages through a stateful session; throttled per host.
    Scrape,
}

/// Per-run context handed to adapters by the pipeline.
#[derive(Debug, Clone)]
pub struct SourceContext {
    throttle: Arc<Throttle>,
    page_ready_timeout: Duration,
}

impl SourceContext {
    /// Creates a context from an explicit throttle and page-ready timeout.
    #[must_use]
    pub fn new(throttle: Arc<Throttle>, page_ready_timeout: Duration) -> Self {
        Self {
            throttle,
            page_ready_timeout,
        }
    }

    /// Navigation throttle for this run.
    #[must_use]
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Upper bound for waiting on a listing page to show rows.
    #[must_use]
    pub fn page_ready_timeout(&self) -> Duration {
        self.page_ready_timeout
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::new(Arc::new(Throttle::disabled()), Duration::from_secs(30))
    }
}

/// Contract every upstream source implements.
///
/// # Object Safety
///
/// Uses `async_trait` so the pipeline can drive `&dyn SourceAdapter`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short source name used in logs and output file names (e.g. `paper`).
    fn name(&self) -> &str;

    /// Whether this source is API-based or scrape-based.
    fn access(&self) -> SourceAccess;

    /// Rule used to turn a selected build into a download URL.
    fn url_rule(&self) -> &UrlRule;

    /// URL version enumeration starts from; rate-limit hints for a failed
    /// enumeration are filed under its host.
    fn index_url(&self) -> &str;

    /// True when output is split into release/snapshot files.
    fn partitions_channels(&self) -> bool {
        false
    }

    /// Enumerates every version the upstream exposes.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the upstream cannot be reached at all.
    async fn list_versions(&self, ctx: &SourceContext) -> Result<Vec<VersionEntry>, FetchError>;

    /// Lists every build discoverable for one version. Empty is a valid result.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure or an elapsed page-ready wait.
    async fn list_builds(
        &self,
        entry: &VersionEntry,
        ctx: &SourceContext,
    ) -> Result<Vec<BuildCandidate>, FetchError>;

    /// Releases the transport or page session held by this adapter.
    async fn release(&self) {}
}

/// Known upstream sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Vanilla,
    Paper,
    Sponge,
    Spigot,
    Forge,
    Fabric,
}

impl SourceId {
    /// All sources in default run order.
    pub const ALL: [SourceId; 6] = [
        SourceId::Vanilla,
        SourceId::Paper,
        SourceId::Sponge,
        SourceId::Spigot,
        SourceId::Forge,
        SourceId::Fabric,
    ];

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vanilla => "vanilla",
            Self::Paper => "paper",
            Self::Sponge => "sponge",
            Self::Spigot => "spigot",
            Self::Forge => "forge",
            Self::Fabric => "fabric",
        }
    }

    /// Human-readable adapter kind, for `list` output.
    #[must_use]
    pub fn kind(self) -> &'static str {
        match self {
            Self::Vanilla => "manifest api",
            Self::Paper => "build api",
            Self::Sponge => "tag-filtered registry",
            Self::Spigot => "directory listing",
            Self::Forge => "installer index",
            Self::Fabric => "loader template",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == lowered)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|id| id.as_str()).collect();
                format!("unknown source '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Builds the adapter for `id` with its own HTTP client.
///
/// Each call creates a fresh transport, so concurrent runs never share one.
///
/// # Errors
///
/// Returns [`FetchError`] when the HTTP client cannot be constructed.
pub fn build_source(id: SourceId, config: &Config) -> Result<Box<dyn SourceAdapter>, FetchError> {
    let client = HttpClient::new(id.as_str(), config.pipeline.http_timeouts())?;
    let sources = &config.sources;

    let adapter: Box<dyn SourceAdapter> = match id {
        SourceId::Vanilla => Box::new(ManifestSource::new(client, &sources.vanilla.manifest_url)),
        SourceId::Paper => Box::new(BuildApiSource::new(
            client,
            &sources.paper.api_url,
            &sources.paper.project,
        )),
        SourceId::Sponge => Box::new(TagRegistrySource::new(
            client,
            &sources.sponge.api_url,
            sources.sponge.url_rule(),
        )),
        SourceId::Spigot => Box::new(DirectoryListingSource::new(
            &sources.spigot.listing_url,
            Box::new(HttpPageSession::new(client)),
        )),
        SourceId::Forge => Box::new(InstallerIndexSource::new(
            &sources.forge.index_url,
            Box::new(HttpPageSession::new(client)),
        )),
        SourceId::Fabric => Box::new(LoaderTemplateSource::new(client, &sources.fabric.meta_url)),
    };
    Ok(adapter)
}
