//! Project API exposing numbered builds per version.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{BuildCandidate, Channel, SourceAccess, SourceAdapter, SourceContext, VersionEntry};
use crate::resolve::UrlRule;
use crate::transport::{FetchError, HttpClient};

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BuildsDocument {
    #[serde(default)]
    builds: Vec<BuildRecord>,
}

#[derive(Debug, Deserialize)]
struct BuildRecord {
    build: u64,
    #[serde(default)]
    downloads: Option<BuildDownloads>,
}

#[derive(Debug, Deserialize)]
struct BuildDownloads {
    application: Option<BuildFile>,
}

#[derive(Debug, Deserialize)]
struct BuildFile {
    name: String,
}

/// Paper-style build API (`/projects/{project}/versions/{v}/builds`).
///
/// The project name doubles as the source name, so sibling projects on the
/// same API (e.g. `velocity`) write their own output files.
#[derive(Debug)]
pub struct BuildApiSource {
    client: HttpClient,
    project: String,
    project_url: String,
    rule: UrlRule,
}

impl BuildApiSource {
    /// Creates a source for `project` under `api_url` (e.g. `https://api.papermc.io/v2`).
    #[must_use]
    pub fn new(client: HttpClient, api_url: &str, project: &str) -> Self {
        let project_url = format!("{}/projects/{project}", api_url.trim_end_matches('/'));
        Self {
            client,
            project: project.to_string(),
            rule: UrlRule::BuildDownloads {
                base: project_url.clone(),
            },
            project_url,
        }
    }

    fn builds_url(&self, version: &str) -> String {
        format!("{}/versions/{version}/builds", self.project_url)
    }
}

#[async_trait]
impl SourceAdapter for BuildApiSource {
    fn name(&self) -> &str {
        &self.project
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Api
    }

    fn url_rule(&self) -> &UrlRule {
        &self.rule
    }

    fn index_url(&self) -> &str {
        &self.project_url
    }

    #[instrument(skip(self, _ctx), fields(project = %self.project))]
    async fn list_versions(&self, _ctx: &SourceContext) -> Result<Vec<VersionEntry>, FetchError> {
        let project: ProjectDocument = self.client.get_json(&self.project_url).await?;
        debug!(count = project.versions.len(), "project versions enumerated");
        Ok(project
            .versions
            .into_iter()
            .map(|version| {
                let locator = self.builds_url(&version);
                VersionEntry::new(version, Channel::Stable, locator)
            })
            .collect())
    }

    async fn list_builds(
        &self,
        entry: &VersionEntry,
        _ctx: &SourceContext,
    ) -> Result<Vec<BuildCandidate>, FetchError> {
        let document: BuildsDocument = self.client.get_json(&entry.locator).await?;
        Ok(document
            .builds
            .into_iter()
            .map(|record| {
                let candidate = BuildCandidate::numbered(record.build);
                match record.downloads.and_then(|d| d.application) {
                    Some(file) => candidate.with_file_name(file.name),
                    None => candidate,
                }
            })
            .collect())
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

    fn source(server: &MockServer) -> BuildApiSource {
        let client = HttpClient::new("paper", HttpTimeouts::default()).unwrap();
        BuildApiSource::new(client, &format!("{}/v2/", server.uri()), "paper")
    }

    #[test]
    fn test_rule_base_points_at_project() {
        let client = HttpClient::new("paper", HttpTimeouts::default()).unwrap();
        let source = BuildApiSource::new(client, "https://api.papermc.io/v2", "velocity");
        assert_eq!(source.name(), "velocity");
        assert_eq!(
            source.url_rule(),
            &UrlRule::BuildDownloads {
                base: "https://api.papermc.io/v2/projects/velocity".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_list_versions_builds_locators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/projects/paper"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project_id": "paper",
                "versions": ["1.8.8", "1.20.4"]
            })))
            .mount(&server)
            .await;

        let versions = source(&server)
            .list_versions(&SourceContext::default())
            .await
            .unwrap();
        let names: Vec<&str> = versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(names, vec!["1.8.8", "1.20.4"]);
        assert_eq!(
            versions[1].locator,
            format!("{}/v2/projects/paper/versions/1.20.4/builds", server.uri())
        );
    }

    #[tokio::test]
    async fn test_list_builds_maps_numbers_and_file_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/projects/paper/versions/1.20.4/builds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "builds": [
                    {"build": 3, "downloads": {"application": {"name": "paper-1.20.4-3.jar"}}},
                    {"build": 7, "downloads": {"application": {"name": "paper-1.20.4-7.jar"}}},
                    {"build": 8, "downloads": {}}
                ]
            })))
            .mount(&server)
            .await;

        let source = source(&server);
        let entry = VersionEntry::new("1.20.4", Channel::Stable, source.builds_url("1.20.4"));
        let builds = source
            .list_builds(&entry, &SourceContext::default())
            .await
            .unwrap();
        assert_eq!(builds.len(), 3);
        assert_eq!(builds[1], BuildCandidate::numbered(7).with_file_name("paper-1.20.4-7.jar"));
        assert_eq!(builds[2], BuildCandidate::numbered(8));
    }

    #[tokio::test]
    async fn test_list_builds_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"builds": []})))
            .mount(&server)
            .await;

        let source = source(&server);
        let entry = VersionEntry::new("1.21", Channel::Stable, source.builds_url("1.21"));
        let builds = source
            .list_builds(&entry, &SourceContext::default())
            .await
            .unwrap();
        assert!(builds.is_empty());
    }
}
