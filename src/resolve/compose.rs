//! Download URL composition rules.

use thiserror::Error;
use url::Url;

use crate::source::BuildCandidate;

/// How a source turns its selected build into a download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlRule {
    /// The candidate location already is the download URL.
    AsIs,
    /// The candidate location is a directory; `file` is joined onto it.
    JoinPath {
        /// File name inside the build directory.
        file: String,
    },
    /// `{base}/versions/{version}/builds/{build}/downloads/{file_name}`.
    BuildDownloads {
        /// Project endpoint, without trailing slash.
        base: String,
    },
    /// Repository layout split on a fixed set of legacy versions; the
    /// candidate file name is the artifact id.
    LegacySplit {
        /// Versions served from the legacy repository.
        legacy_versions: Vec<String>,
        /// Legacy repository root.
        legacy_base: String,
        /// Current repository root.
        modern_base: String,
        /// Maven artifact name (e.g. `spongevanilla`).
        artifact: String,
    },
}

/// Why no URL could be produced for a selected build.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// The candidate lacks a field the rule needs.
    #[error("selected build has no {0}")]
    MissingField(&'static str),

    /// The composed value is not an absolute URL.
    #[error("composed value is not a valid URL: {0}")]
    InvalidUrl(String),
}

/// Composes the download URL for `candidate` of `version` under `rule`.
///
/// # Errors
///
/// Returns [`ComposeError`] when the candidate lacks what the rule needs or
/// the result does not parse as a URL.
pub fn compose(
    version: &str,
    candidate: &BuildCandidate,
    rule: &UrlRule,
) -> Result<String, ComposeError> {
    let raw = match rule {
        UrlRule::AsIs => required(candidate.location.as_deref(), "location")?.to_string(),
        UrlRule::JoinPath { file } => {
            let location = required(candidate.location.as_deref(), "location")?;
            let directory = if location.ends_with('/') {
                location.to_string()
            } else {
                format!("{location}/")
            };
            let base =
                Url::parse(&directory).map_err(|_| ComposeError::InvalidUrl(directory.clone()))?;
            base.join(file)
                .map_err(|_| ComposeError::InvalidUrl(format!("{directory}{file}")))?
                .to_string()
        }
        UrlRule::BuildDownloads { base } => {
            let build = candidate
                .build_number
                .ok_or(ComposeError::MissingField("build number"))?;
            let file = required(candidate.file_name.as_deref(), "file name")?;
            format!(
                "{}/versions/{version}/builds/{build}/downloads/{file}",
                base.trim_end_matches('/')
            )
        }
        UrlRule::LegacySplit {
            legacy_versions,
            legacy_base,
            modern_base,
            artifact,
        } => {
            let id = required(candidate.file_name.as_deref(), "artifact id")?;
            if legacy_versions.iter().any(|v| v == version) {
                format!("{}/{id}/{artifact}-{id}.jar", legacy_base.trim_end_matches('/'))
            } else {
                format!(
                    "{}/{id}/{artifact}-{id}-universal.jar",
                    modern_base.trim_end_matches('/')
                )
            }
        }
    };

    Url::parse(&raw)
        .map(|url| url.to_string())
        .map_err(|_| ComposeError::InvalidUrl(raw))
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ComposeError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ComposeError::MissingField(field))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn legacy_rule() -> UrlRule {
        UrlRule::LegacySplit {
            legacy_versions: vec!["1.8.9".to_string(), "1.11.2".to_string()],
            legacy_base: "https://repo.example.org/legacy-transfer/org/spongepowered/spongevanilla"
                .to_string(),
            modern_base: "https://repo.example.org/maven-releases/org/spongepowered/spongevanilla/"
                .to_string(),
            artifact: "spongevanilla".to_string(),
        }
    }

    #[test]
    fn test_as_is_passes_location_through() {
        let candidate = BuildCandidate::default().with_location("https://cdn.example.com/server.jar");
        assert_eq!(
            compose("1.20.4", &candidate, &UrlRule::AsIs).unwrap(),
            "https://cdn.example.com/server.jar"
        );
    }

    #[test]
    fn test_as_is_without_location_is_missing_field() {
        let err = compose("rd-132211", &BuildCandidate::default(), &UrlRule::AsIs).unwrap_err();
        assert_eq!(err, ComposeError::MissingField("location"));
    }

    #[test]
    fn test_join_path_appends_file_to_directory() {
        let rule = UrlRule::JoinPath {
            file: "server.jar".to_string(),
        };
        let with_slash = BuildCandidate::numbered(12).with_location("https://files.example.com/spigot/1.20.4/12/");
        let without_slash = BuildCandidate::numbered(12).with_location("https://files.example.com/spigot/1.20.4/12");
        let expected = "https://files.example.com/spigot/1.20.4/12/server.jar";
        assert_eq!(compose("1.20.4", &with_slash, &rule).unwrap(), expected);
        assert_eq!(compose("1.20.4", &without_slash, &rule).unwrap(), expected);
    }

    #[test]
    fn test_build_downloads_layout() {
        let rule = UrlRule::BuildDownloads {
            base: "https://api.papermc.io/v2/projects/paper".to_string(),
        };
        let candidate = BuildCandidate::numbered(7).with_file_name("paper-1.20.4-7.jar");
        assert_eq!(
            compose("1.20.4", &candidate, &rule).unwrap(),
            "https://api.papermc.io/v2/projects/paper/versions/1.20.4/builds/7/downloads/paper-1.20.4-7.jar"
        );
    }

    #[test]
    fn test_build_downloads_without_file_name_is_no_match() {
        let rule = UrlRule::BuildDownloads {
            base: "https://api.papermc.io/v2/projects/paper".to_string(),
        };
        let err = compose("1.20.4", &BuildCandidate::numbered(8), &rule).unwrap_err();
        assert_eq!(err, ComposeError::MissingField("file name"));
    }

    #[test]
    fn test_legacy_split_uses_legacy_template_for_allowlisted_version() {
        let candidate = BuildCandidate::default().with_file_name("1.11.2-6.1.0-BETA-27");
        assert_eq!(
            compose("1.11.2", &candidate, &legacy_rule()).unwrap(),
            "https://repo.example.org/legacy-transfer/org/spongepowered/spongevanilla/1.11.2-6.1.0-BETA-27/spongevanilla-1.11.2-6.1.0-BETA-27.jar"
        );
    }

    #[test]
    fn test_legacy_split_uses_modern_template_otherwise() {
        let candidate = BuildCandidate::default().with_file_name("1.12.2-7.4.7");
        assert_eq!(
            compose("1.12.2", &candidate, &legacy_rule()).unwrap(),
            "https://repo.example.org/maven-releases/org/spongepowered/spongevanilla/1.12.2-7.4.7/spongevanilla-1.12.2-7.4.7-universal.jar"
        );
    }

    #[test]
    fn test_relative_location_is_invalid_url() {
        let candidate = BuildCandidate::default().with_location("downloads/server.jar");
        assert!(matches!(
            compose("1.0", &candidate, &UrlRule::AsIs),
            Err(ComposeError::InvalidUrl(_))
        ));
    }
}
