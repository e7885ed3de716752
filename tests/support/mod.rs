//! Shared helpers for integration tests: mock upstreams and fast pipeline options.

#![allow(dead_code)]

use std::time::Duration;

use jarcrawler_core::{PipelineOptions, ResolutionPipeline, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Pipeline with no backoff, no throttle and a short page-ready bound.
pub fn fast_pipeline(max_attempts: u32) -> ResolutionPipeline {
    ResolutionPipeline::new(PipelineOptions {
        retry_policy: RetryPolicy::immediate(max_attempts),
        throttle_delay: Duration::ZERO,
        page_ready_timeout: Duration::from_millis(300),
    })
}

/// Directory listing HTML with one anchor row per entry.
pub fn listing_html(entries: &[&str]) -> String {
    let mut rows = String::from(
        "<tr><td><a href=\"../\">[Parent Directory]</a></td><td>-</td></tr>\n",
    );
    for entry in entries {
        rows.push_str(&format!(
            "<tr><td><a href=\"{entry}\">{entry}</a></td><td>-</td></tr>\n"
        ));
    }
    format!("<html><body><table>\n{rows}</table></body></html>")
}

/// Mounts a paper-style project with per-version build numbers.
pub async fn mount_build_api(server: &MockServer, project: &str, versions: &[(&str, &[u64])]) {
    let names: Vec<&str> = versions.iter().map(|(v, _)| *v).collect();
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{project}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "project_id": project,
            "versions": names
        })))
        .mount(server)
        .await;

    for (version, builds) in versions {
        let builds: Vec<_> = builds
            .iter()
            .map(|n| {
                json!({
                    "build": n,
                    "downloads": {"application": {"name": format!("{project}-{version}-{n}.jar")}}
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/v2/projects/{project}/versions/{version}/builds")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "builds": builds })))
            .mount(server)
            .await;
    }
}
