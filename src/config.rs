//! Run configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! or missing file yields the stock upstream endpoints. CLI flags are
//! applied on top by the binary.
//!
//! ```toml
//! [pipeline]
//! max_attempts = 3
//! throttle_ms = 5000
//!
//! [output]
//! dir = "out"
//!
//! [sources.paper]
//! project = "velocity"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::resolve::{DEFAULT_PAGE_READY_TIMEOUT, PipelineOptions, UrlRule};
use crate::source::SourceId;
use crate::transport::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_THROTTLE_DELAY, HttpTimeouts, RetryPolicy,
};

/// Directory name under the user config dir.
const APP_DIR: &str = "jarcrawler";
const CONFIG_FILE: &str = "config.toml";

/// Upper bound for attempts per request.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;
/// Upper bound for the navigation throttle.
pub const MAX_THROTTLE_MS: u64 = 60_000;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or malformed.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub sources: SourcesConfig,
}

/// `[pipeline]`: retry, pacing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Attempts per upstream request, including the first.
    pub max_attempts: u32,
    /// Minimum spacing between scrape navigations to one host; 0 disables.
    pub throttle_ms: u64,
    /// How long a listing page may take to show its first row.
    pub page_ready_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for PipelineConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            throttle_ms: DEFAULT_THROTTLE_DELAY.as_millis() as u64,
            page_ready_timeout_secs: DEFAULT_PAGE_READY_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    /// Client timeouts for adapters.
    #[must_use]
    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect_secs: self.connect_timeout_secs,
            read_secs: self.read_timeout_secs,
        }
    }

    /// Pipeline options derived from this section.
    #[must_use]
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            retry_policy: RetryPolicy::with_max_attempts(self.max_attempts),
            throttle_delay: Duration::from_millis(self.throttle_ms),
            page_ready_timeout: Duration::from_secs(self.page_ready_timeout_secs),
        }
    }
}

/// `[output]`: where and what to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Also write `unresolved_<source>.json`.
    pub write_unresolved: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            write_unresolved: true,
        }
    }
}

/// `[sources.*]`: per-upstream endpoints and switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub vanilla: VanillaConfig,
    pub paper: PaperConfig,
    pub sponge: SpongeConfig,
    pub spigot: SpigotConfig,
    pub forge: ForgeConfig,
    pub fabric: FabricConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VanillaConfig {
    pub enabled: bool,
    pub manifest_url: String,
}

impl Default for VanillaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            manifest_url: "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaperConfig {
    pub enabled: bool,
    pub api_url: String,
    /// Project on the build API (`paper`, `folia`, `velocity`, ...).
    pub project: String,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://api.papermc.io/v2".to_string(),
            project: "paper".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpongeConfig {
    pub enabled: bool,
    /// Artifact endpoint on the download API.
    pub api_url: String,
    pub artifact: String,
    pub legacy_repo_url: String,
    pub release_repo_url: String,
    /// Versions whose jars live in the legacy repository.
    pub legacy_versions: Vec<String>,
}

impl Default for SpongeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url:
                "https://dl-api.spongepowered.org/v2/groups/org.spongepowered/artifacts/spongevanilla"
                    .to_string(),
            artifact: "spongevanilla".to_string(),
            legacy_repo_url: "https://repo.spongepowered.org/repository/legacy-transfer/org/spongepowered/spongevanilla".to_string(),
            release_repo_url: "https://repo.spongepowered.org/repository/maven-releases/org/spongepowered/spongevanilla".to_string(),
            legacy_versions: ["1.8", "1.8.9", "1.9", "1.9.4", "1.10.2", "1.11", "1.11.2"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl SpongeConfig {
    /// Legacy/modern repository split for composed URLs.
    #[must_use]
    pub fn url_rule(&self) -> UrlRule {
        UrlRule::LegacySplit {
            legacy_versions: self.legacy_versions.clone(),
            legacy_base: self.legacy_repo_url.clone(),
            modern_base: self.release_repo_url.clone(),
            artifact: self.artifact.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpigotConfig {
    pub enabled: bool,
    pub listing_url: String,
}

impl Default for SpigotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listing_url: "https://files.mcjars.app/spigot/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    pub enabled: bool,
    /// Download index page with the per-version navigation list.
    pub index_url: String,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_url: "https://files.minecraftforge.net/net/minecraftforge/forge/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FabricConfig {
    pub enabled: bool,
    pub meta_url: String,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            meta_url: "https://meta.fabricmc.net".to_string(),
        }
    }
}

impl SourcesConfig {
    /// Whether `id` is switched on.
    #[must_use]
    pub fn is_enabled(&self, id: SourceId) -> bool {
        match id {
            SourceId::Vanilla => self.vanilla.enabled,
            SourceId::Paper => self.paper.enabled,
            SourceId::Sponge => self.sponge.enabled,
            SourceId::Spigot => self.spigot.enabled,
            SourceId::Forge => self.forge.enabled,
            SourceId::Fabric => self.fabric.enabled,
        }
    }

    /// Enabled sources in default run order.
    #[must_use]
    pub fn enabled(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.is_enabled(*id))
            .collect()
    }

    /// Primary endpoint of `id`, for display.
    #[must_use]
    pub fn endpoint(&self, id: SourceId) -> &str {
        match id {
            SourceId::Vanilla => &self.vanilla.manifest_url,
            SourceId::Paper => &self.paper.api_url,
            SourceId::Sponge => &self.sponge.api_url,
            SourceId::Spigot => &self.spigot.listing_url,
            SourceId::Forge => &self.forge.index_url,
            SourceId::Fabric => &self.fabric.meta_url,
        }
    }
}

impl Config {
    /// Parses configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// read when present and defaults are used otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(found) => found,
                None => {
                    debug!("no config file found; using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!(path = %path.display(), "loading config file");
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content, &path)
    }

    /// Checks value ranges and endpoint URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&p.max_attempts) {
            return Err(ConfigError::invalid(
                "pipeline.max_attempts",
                format!("must be between 1 and {MAX_ATTEMPTS_LIMIT}"),
            ));
        }
        if p.throttle_ms > MAX_THROTTLE_MS {
            return Err(ConfigError::invalid(
                "pipeline.throttle_ms",
                format!("must be at most {MAX_THROTTLE_MS}"),
            ));
        }
        for (field, value, max) in [
            ("pipeline.page_ready_timeout_secs", p.page_ready_timeout_secs, 600),
            ("pipeline.connect_timeout_secs", p.connect_timeout_secs, 300),
            ("pipeline.read_timeout_secs", p.read_timeout_secs, 3600),
        ] {
            if !(1..=max).contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be between 1 and {max} seconds"),
                ));
            }
        }

        let s = &self.sources;
        for (field, value) in [
            ("sources.vanilla.manifest_url", &s.vanilla.manifest_url),
            ("sources.paper.api_url", &s.paper.api_url),
            ("sources.sponge.api_url", &s.sponge.api_url),
            ("sources.sponge.legacy_repo_url", &s.sponge.legacy_repo_url),
            ("sources.sponge.release_repo_url", &s.sponge.release_repo_url),
            ("sources.spigot.listing_url", &s.spigot.listing_url),
            ("sources.forge.index_url", &s.forge.index_url),
            ("sources.fabric.meta_url", &s.fabric.meta_url),
        ] {
            Url::parse(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
        }

        if s.paper.project.trim().is_empty() || s.paper.project.contains('/') {
            return Err(ConfigError::invalid(
                "sources.paper.project",
                "must be a non-empty project name",
            ));
        }
        if s.sponge.artifact.trim().is_empty() {
            return Err(ConfigError::invalid("sources.sponge.artifact", "must not be empty"));
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/jarcrawler/config.toml`, else `$HOME/.config/jarcrawler/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
        })?;
    Some(base.join(APP_DIR).join(CONFIG_FILE))
}
