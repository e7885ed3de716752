//! Page sessions for scrape-based sources.
//!
//! A [`PageSession`] is the single stateful navigation resource of a scrape
//! run: it is exclusively owned by one adapter, navigated strictly in
//! sequence (`&mut self`), and closed when the run ends.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument, warn};
use url::Url;

use super::SourceContext;
use crate::transport::{FetchError, HttpClient};

static ROW_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<td[^>]*>\s*<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#,
    )
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));

pub(super) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// One `table tr td a` row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// Visible anchor text, trimmed (e.g. `1.20.4/`).
    pub text: String,
    /// Absolute link target.
    pub href: String,
}

/// Result of opening a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageListing {
    /// Final page URL.
    pub url: String,
    /// Rows found on the page; empty when the page was not ready.
    pub rows: Vec<ListingRow>,
    /// False when the ready wait elapsed without a row appearing.
    pub ready: bool,
}

impl PageListing {
    /// A page whose ready wait elapsed; treated as having zero rows.
    #[must_use]
    pub fn not_ready(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rows: Vec::new(),
            ready: false,
        }
    }
}

/// Raw HTML of a loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDocument {
    /// Final page URL after redirects; relative links resolve against it.
    pub url: String,
    pub html: String,
}

/// Stateful navigation session over scraped pages.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigates to `url` and returns the loaded document, or `None` when the
    /// page did not finish loading within `ready_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the page cannot be loaded at all.
    async fn load(
        &mut self,
        url: &str,
        ready_timeout: Duration,
    ) -> Result<Option<PageDocument>, FetchError>;

    /// Navigates to a directory listing and waits up to `ready_timeout` for
    /// at least one row.
    ///
    /// An elapsed wait is not an error: it yields [`PageListing::not_ready`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the page cannot be loaded at all.
    async fn open(
        &mut self,
        url: &str,
        ready_timeout: Duration,
    ) -> Result<PageListing, FetchError> {
        let Some(document) = self.load(url, ready_timeout).await? else {
            return Ok(PageListing::not_ready(url));
        };

        let rows = parse_listing_rows(&document.html, &document.url);
        if rows.is_empty() {
            warn!(url, "listing page has no rows; treating as not ready");
            return Ok(PageListing::not_ready(document.url));
        }

        debug!(url, rows = rows.len(), "listing page ready");
        Ok(PageListing {
            url: document.url,
            rows,
            ready: true,
        })
    }

    /// Releases the session. Further navigation is not expected.
    async fn close(&mut self);
}

/// Runs one navigation under the run's throttle.
///
/// Waits out the host's quiet period first and restarts it once the page
/// finished loading, successful or not.
pub(crate) async fn paced<T, Fut>(
    ctx: &SourceContext,
    url: &str,
    navigation: Fut,
) -> Result<T, FetchError>
where
    Fut: Future<Output = Result<T, FetchError>> + Send,
{
    ctx.throttle().acquire(url).await;
    let result = navigation.await;
    ctx.throttle().complete(url).await;
    result
}

/// [`PageSession`] over plain HTTP for server-rendered pages.
///
/// A page has loaded once its whole body arrived; a response slower than the
/// ready timeout counts as not loaded.
#[derive(Debug)]
pub struct HttpPageSession {
    client: HttpClient,
    current_url: Option<String>,
    closed: bool,
}

impl HttpPageSession {
    /// Creates a session over `client`.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            current_url: None,
            closed: false,
        }
    }

    /// URL of the last page opened.
    #[must_use]
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// Whether [`PageSession::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl PageSession for HttpPageSession {
    #[instrument(skip(self), fields(timeout_ms = ready_timeout.as_millis()))]
    async fn load(
        &mut self,
        url: &str,
        ready_timeout: Duration,
    ) -> Result<Option<PageDocument>, FetchError> {
        self.current_url = Some(url.to_string());

        let fetched = tokio::time::timeout(ready_timeout, self.client.get_text(url)).await;
        let (html, final_url) = match fetched {
            Ok(result) => result?,
            Err(_) => {
                warn!(url, "page did not load before ready timeout");
                return Ok(None);
            }
        };

        self.current_url = Some(final_url.clone());
        Ok(Some(PageDocument {
            url: final_url,
            html,
        }))
    }

    async fn close(&mut self) {
        if !self.closed {
            debug!(last_url = ?self.current_url, "closing page session");
        }
        self.closed = true;
        self.current_url = None;
    }
}

/// Extracts `table tr td a` rows from listing HTML, resolving hrefs against `base_url`.
///
/// Rows whose href cannot be resolved are skipped.
#[must_use]
pub fn parse_listing_rows(html: &str, base_url: &str) -> Vec<ListingRow> {
    let base = Url::parse(base_url).ok();

    ROW_LINK_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let raw_href = caps.get(1)?.as_str().trim();
            let inner = caps.get(2).map_or("", |m| m.as_str());
            let text = element_text(inner);
            let href = match &base {
                Some(base) => base.join(&decode_entities(raw_href)).ok()?.to_string(),
                None => Url::parse(raw_href).ok()?.to_string(),
            };
            Some(ListingRow { text, href })
        })
        .collect()
}

/// Visible text of an element's inner HTML: tags stripped, entities decoded.
pub(super) fn element_text(inner_html: &str) -> String {
    decode_entities(TAG_RE.replace_all(inner_html, "").trim())
}

pub(super) fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
