//! Shared HTTP client for source adapters.
//!
//! Centralizes networking defaults so every adapter behaves the same on
//! timeout, user-agent, compression and proxy compatibility, and maps
//! transport failures into [`FetchError`] in one place.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Proxy};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::user_agent;

use super::FetchError;

/// Default connect timeout for upstream requests.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default read timeout for upstream requests.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

/// Connect/read timeouts applied to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout in seconds.
    pub connect_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

/// Thin wrapper around [`reqwest::Client`] that speaks [`FetchError`].
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client using shared project policy.
    ///
    /// `source_name` is used only for logging and error messages.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidResponse`] when client construction fails.
    pub fn new(source_name: &str, timeouts: HttpTimeouts) -> Result<Self, FetchError> {
        let user_agent = user_agent::default_user_agent();

        match try_build_client(&user_agent, timeouts, false) {
            Ok(client) => Ok(Self { client }),
            Err(BuildClientFailure::Panic) => {
                // Some sandboxed environments panic when querying system proxy
                // settings; the fallback keeps env-proxy support only.
                warn!(
                    source = source_name,
                    "HTTP client hit system proxy panic; using env-proxy fallback builder"
                );
                match try_build_client(&user_agent, timeouts, true) {
                    Ok(client) => Ok(Self { client }),
                    Err(BuildClientFailure::Panic) => Err(FetchError::invalid_response(
                        source_name,
                        "HTTP client construction panicked while initializing networking",
                    )),
                    Err(BuildClientFailure::Build(error)) => Err(FetchError::invalid_response(
                        source_name,
                        format!("HTTP client construction failed: {error}"),
                    )),
                }
            }
            Err(BuildClientFailure::Build(error)) => Err(FetchError::invalid_response(
                source_name,
                format!("HTTP client construction failed: {error}"),
            )),
        }
    }

    /// Fetches `url` and deserializes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, non-success status, or a
    /// body that does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let request = self.client.get(url).header(ACCEPT, "application/json");
        let response = send(request, url).await?;
        let body = response.text().await.map_err(|e| map_transport_error(url, e))?;
        serde_json::from_str(&body).map_err(|e| {
            debug!(url, error = %e, "response body did not match expected shape");
            FetchError::invalid_response(url, e.to_string())
        })
    }

    /// Fetches `url` and returns the body as text along with the final URL
    /// after redirects (needed to resolve relative links).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure or non-success status.
    pub async fn get_text(&self, url: &str) -> Result<(String, String), FetchError> {
        let request = self.client.get(url).header(
            ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        let response = send(request, url).await?;
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| map_transport_error(url, e))?;
        Ok((body, final_url))
    }
}

async fn send(request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| map_transport_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        return Err(FetchError::http_status_with_retry_after(
            url,
            status.as_u16(),
            retry_after,
        ));
    }

    Ok(response)
}

fn map_transport_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else if error.is_builder() {
        FetchError::invalid_url(url)
    } else {
        FetchError::network(url, error)
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    user_agent: &str,
    timeouts: HttpTimeouts,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(user_agent, timeouts);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(user_agent: String, timeouts: HttpTimeouts) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .user_agent(user_agent)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
