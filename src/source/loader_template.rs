//! Loader meta API with a templated server-jar endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{BuildCandidate, Channel, SourceAccess, SourceAdapter, SourceContext, VersionEntry};
use crate::resolve::UrlRule;
use crate::transport::{FetchError, HttpClient};

#[derive(Debug, Deserialize)]
struct GameVersion {
    version: String,
    stable: bool,
}

#[derive(Debug, Deserialize)]
struct ComponentVersion {
    version: String,
}

/// Fabric-style meta API.
///
/// The newest loader and installer (first entries of their lists) are
/// combined with every game version into a launcher-jar endpoint, so each
/// version has exactly one candidate and no per-version fetch is needed.
#[derive(Debug)]
pub struct LoaderTemplateSource {
    client: HttpClient,
    versions_url: String,
    rule: UrlRule,
}

impl LoaderTemplateSource {
    /// Creates a source for the meta API rooted at `meta_url`.
    #[must_use]
    pub fn new(client: HttpClient, meta_url: &str) -> Self {
        Self {
            client,
            versions_url: format!("{}/v2/versions", meta_url.trim_end_matches('/')),
            rule: UrlRule::AsIs,
        }
    }

    async fn latest_component(&self, component: &str) -> Result<String, FetchError> {
        let url = format!("{}/{component}", self.versions_url);
        let versions: Vec<ComponentVersion> = self.client.get_json(&url).await?;
        versions
            .into_iter()
            .next()
            .map(|v| v.version)
            .ok_or_else(|| FetchError::invalid_response(&url, format!("no {component} versions listed")))
    }

    fn server_jar_url(&self, game: &str, loader: &str, installer: &str) -> String {
        format!(
            "{}/loader/{game}/{loader}/{installer}/server/jar",
            self.versions_url
        )
    }
}

#[async_trait]
impl SourceAdapter for LoaderTemplateSource {
    fn name(&self) -> &str {
        "fabric"
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Api
    }

    fn url_rule(&self) -> &UrlRule {
        &self.rule
    }

    fn index_url(&self) -> &str {
        &self.versions_url
    }

    fn partitions_channels(&self) -> bool {
        true
    }

    #[instrument(skip(self, _ctx), fields(url = %self.versions_url))]
    async fn list_versions(&self, _ctx: &SourceContext) -> Result<Vec<VersionEntry>, FetchError> {
        let games: Vec<GameVersion> = self
            .client
            .get_json(&format!("{}/game", self.versions_url))
            .await?;
        let loader = self.latest_component("loader").await?;
        let installer = self.latest_component("installer").await?;
        debug!(%loader, %installer, games = games.len(), "loader meta enumerated");

        Ok(games
            .into_iter()
            .map(|game| {
                let channel = if game.stable {
                    Channel::Stable
                } else {
                    Channel::Unstable
                };
                let locator = self.server_jar_url(&game.version, &loader, &installer);
                VersionEntry::new(game.version, channel, locator)
            })
            .collect())
    }

    async fn list_builds(
        &self,
        entry: &VersionEntry,
        _ctx: &SourceContext,
    ) -> Result<Vec<BuildCandidate>, FetchError> {
        Ok(vec![BuildCandidate::default().with_location(entry.locator.clone())])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::transport::HttpTimeouts;

    fn source(server: &MockServer) -> LoaderTemplateSource {
        let client = HttpClient::new("fabric", HttpTimeouts::default()).unwrap();
        LoaderTemplateSource::new(client, &server.uri())
    }

    async fn mount(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_list_versions_templates_latest_loader_and_installer() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/v2/versions/game",
            json!([
                {"version": "24w03a", "stable": false},
                {"version": "1.20.4", "stable": true}
            ]),
        )
        .await;
        mount(
            &server,
            "/v2/versions/loader",
            json!([{"version": "0.15.6", "stable": true}, {"version": "0.15.5", "stable": true}]),
        )
        .await;
        mount(&server, "/v2/versions/installer", json!([{"version": "1.0.0"}])).await;

        let versions = source(&server)
            .list_versions(&SourceContext::default())
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].channel, Channel::Unstable);
        assert_eq!(versions[1].channel, Channel::Stable);
        assert_eq!(
            versions[1].locator,
            format!(
                "{}/v2/versions/loader/1.20.4/0.15.6/1.0.0/server/jar",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_list_versions_without_loaders_fails() {
        let server = MockServer::start().await;
        mount(&server, "/v2/versions/game", json!([{"version": "1.20.4", "stable": true}])).await;
        mount(&server, "/v2/versions/loader", json!([])).await;
        mount(&server, "/v2/versions/installer", json!([{"version": "1.0.0"}])).await;

        let err = source(&server)
            .list_versions(&SourceContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_list_builds_returns_locator_without_fetching() {
        let server = MockServer::start().await;
        let entry = VersionEntry::new("1.20.4", Channel::Stable, "https://meta.example.com/jar");
        let builds = source(&server)
            .list_builds(&entry, &SourceContext::default())
            .await
            .unwrap();
        assert_eq!(
            builds,
            vec![BuildCandidate::default().with_location("https://meta.example.com/jar")]
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
