//! Artifact registry queried by tag.

use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{BuildCandidate, Channel, SourceAccess, SourceAdapter, SourceContext, VersionEntry};
use crate::resolve::UrlRule;
use crate::transport::{FetchError, HttpClient};

/// Tag key holding game versions.
const VERSION_TAG: &str = "minecraft";

#[derive(Debug, Deserialize)]
struct ArtifactDocument {
    #[serde(default)]
    tags: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct VersionsDocument {
    #[serde(default)]
    artifacts: IndexMap<String, serde_json::Value>,
}

/// Sponge-style registry: versions come from the artifact's tag list and
/// each version is looked up by tag filter, newest artifact first.
#[derive(Debug)]
pub struct TagRegistrySource {
    client: HttpClient,
    artifact_url: String,
    rule: UrlRule,
}

impl TagRegistrySource {
    /// Creates a registry source for the artifact at `artifact_url`.
    #[must_use]
    pub fn new(client: HttpClient, artifact_url: &str, rule: UrlRule) -> Self {
        Self {
            client,
            artifact_url: artifact_url.trim_end_matches('/').to_string(),
            rule,
        }
    }

    fn versions_query_url(&self, version: &str) -> Result<String, FetchError> {
        let base = format!("{}/versions", self.artifact_url);
        let mut url = Url::parse(&base).map_err(|_| FetchError::invalid_url(&base))?;
        url.query_pairs_mut()
            .append_pair("limit", "1")
            .append_pair("tags", &format!("{VERSION_TAG}:{version}"));
        Ok(url.to_string())
    }
}

/// Bare major lines (`1.8`, `1.20`) are tag aliases, not versions.
fn is_patch_version(version: &str) -> bool {
    version.matches('.').count() > 1
}

#[async_trait]
impl SourceAdapter for TagRegistrySource {
    fn name(&self) -> &str {
        "sponge"
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Api
    }

    fn url_rule(&self) -> &UrlRule {
        &self.rule
    }

    fn index_url(&self) -> &str {
        &self.artifact_url
    }

    #[instrument(skip(self, _ctx), fields(url = %self.artifact_url))]
    async fn list_versions(&self, _ctx: &SourceContext) -> Result<Vec<VersionEntry>, FetchError> {
        let mut document: ArtifactDocument = self.client.get_json(&self.artifact_url).await?;
        let tagged = document.tags.remove(VERSION_TAG).unwrap_or_default();
        let total = tagged.len();

        let entries = tagged
            .into_iter()
            .filter(|v| is_patch_version(v))
            .map(|version| {
                let locator = self.versions_query_url(&version)?;
                Ok(VersionEntry::new(version, Channel::Stable, locator))
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        debug!(total, kept = entries.len(), "tagged versions enumerated");
        Ok(entries)
    }

    async fn list_builds(
        &self,
        entry: &VersionEntry,
        _ctx: &SourceContext,
    ) -> Result<Vec<BuildCandidate>, FetchError> {
        let document: VersionsDocument = self.client.get_json(&entry.locator).await?;
        Ok(document
            .artifacts
            .into_keys()
            .next()
            .map(|artifact| vec![BuildCandidate::default().with_file_name(artifact)])
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::transport::HttpTimeouts;

    fn source(server: &MockServer) -> TagRegistrySource {
        let client = HttpClient::new("sponge", HttpTimeouts::default()).unwrap();
        TagRegistrySource::new(
            client,
            &format!("{}/artifacts/spongevanilla", server.uri()),
            UrlRule::AsIs,
        )
    }

    #[test]
    fn test_is_patch_version() {
        assert!(is_patch_version("1.12.2"));
        assert!(!is_patch_version("1.12"));
        assert!(!is_patch_version("1"));
    }

    #[tokio::test]
    async fn test_list_versions_filters_major_lines() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifacts/spongevanilla"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tags": {"minecraft": ["1.20.2", "1.20", "1.12.2"], "api": ["8.0"]}
            })))
            .mount(&server)
            .await;

        let versions = source(&server)
            .list_versions(&SourceContext::default())
            .await
            .unwrap();
        let names: Vec<&str> = versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(names, vec!["1.20.2", "1.12.2"]);
        assert!(versions[0].locator.contains("limit=1"));
        assert!(versions[0].locator.contains("tags=minecraft%3A1.20.2"));
    }

    #[tokio::test]
    async fn test_list_versions_without_tags_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let versions = source(&server)
            .list_versions(&SourceContext::default())
            .await
            .unwrap();
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn test_list_builds_takes_first_artifact_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifacts/spongevanilla/versions"))
            .and(query_param("limit", "1"))
            .and(query_param("tags", "minecraft:1.12.2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"artifacts": {"1.12.2-7.4.7": {"recommended": true}, "1.12.2-7.4.6": {}}}"#,
            ))
            .mount(&server)
            .await;

        let source = source(&server);
        let entry = VersionEntry::new(
            "1.12.2",
            Channel::Stable,
            source.versions_query_url("1.12.2").unwrap(),
        );
        let builds = source
            .list_builds(&entry, &SourceContext::default())
            .await
            .unwrap();
        assert_eq!(builds, vec![BuildCandidate::default().with_file_name("1.12.2-7.4.7")]);
    }

    #[tokio::test]
    async fn test_list_builds_without_artifacts_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"artifacts": {}})))
            .mount(&server)
            .await;

        let source = source(&server);
        let entry = VersionEntry::new(
            "1.21.1",
            Channel::Stable,
            source.versions_query_url("1.21.1").unwrap(),
        );
        let builds = source
            .list_builds(&entry, &SourceContext::default())
            .await
            .unwrap();
        assert!(builds.is_empty());
    }
}
