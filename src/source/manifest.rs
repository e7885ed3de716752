//! Flat version manifest with a per-version asset document.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{BuildCandidate, Channel, SourceAccess, SourceAdapter, SourceContext, VersionEntry};
use crate::resolve::UrlRule;
use crate::transport::{FetchError, HttpClient};

#[derive(Debug, Deserialize)]
struct Manifest {
    versions: Vec<ManifestVersion>,
}

#[derive(Debug, Deserialize)]
struct ManifestVersion {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct AssetDocument {
    #[serde(default)]
    downloads: AssetDownloads,
}

#[derive(Debug, Default, Deserialize)]
struct AssetDownloads {
    server: Option<AssetFile>,
}

#[derive(Debug, Deserialize)]
struct AssetFile {
    url: String,
}

/// Vanilla-style manifest source.
///
/// Versions are classified by manifest `type`: anything containing
/// `release` is stable, anything containing `snapshot` is unstable, and
/// historical alpha/beta types are skipped. Each version exposes a single
/// build whose location is the server download, or no location when the
/// asset document lacks one.
#[derive(Debug)]
pub struct ManifestSource {
    client: HttpClient,
    manifest_url: String,
    rule: UrlRule,
}

impl ManifestSource {
    /// Creates a manifest source reading `manifest_url`.
    #[must_use]
    pub fn new(client: HttpClient, manifest_url: &str) -> Self {
        Self {
            client,
            manifest_url: manifest_url.to_string(),
            rule: UrlRule::AsIs,
        }
    }
}

fn classify(kind: &str) -> Option<Channel> {
    if kind.contains("release") {
        Some(Channel::Stable)
    } else if kind.contains("snapshot") {
        Some(Channel::Unstable)
    } else {
        None
    }
}

#[async_trait]
impl SourceAdapter for ManifestSource {
    fn name(&self) -> &str {
        "vanilla"
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Api
    }

    fn url_rule(&self) -> &UrlRule {
        &self.rule
    }

    fn index_url(&self) -> &str {
        &self.manifest_url
    }

    fn partitions_channels(&self) -> bool {
        true
    }

    #[instrument(skip(self, _ctx), fields(url = %self.manifest_url))]
    async fn list_versions(&self, _ctx: &SourceContext) -> Result<Vec<VersionEntry>, FetchError> {
        let manifest: Manifest = self.client.get_json(&self.manifest_url).await?;
        let total = manifest.versions.len();

        let entries: Vec<VersionEntry> = manifest
            .versions
            .into_iter()
            .filter_map(|v| classify(&v.kind).map(|channel| VersionEntry::new(v.id, channel, v.url)))
            .collect();

        debug!(total, kept = entries.len(), "manifest enumerated");
        Ok(entries)
    }

    async fn list_builds(
        &self,
        entry: &VersionEntry,
        _ctx: &SourceContext,
    ) -> Result<Vec<BuildCandidate>, FetchError> {
        let asset: AssetDocument = self.client.get_json(&entry.locator).await?;
        let candidate = match asset.downloads.server {
            Some(server) => BuildCandidate::default().with_location(server.url),
            None => BuildCandidate::default(),
        };
        Ok(vec![candidate])
    }
}
