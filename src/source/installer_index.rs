//! Scraped version index plus one download page per version (forge).
//!
//! The index page lists every version in collapsible navigation lists; each
//! version page carries the download links of its promoted builds. Links may
//! be wrapped in an ad redirect whose `url=` tail is the real target.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use super::session::{
    PageDocument, PageSession, compile_static_regex, decode_entities, element_text, paced,
};
use super::{BuildCandidate, Channel, SourceAccess, SourceAdapter, SourceContext, VersionEntry};
use crate::resolve::UrlRule;
use crate::transport::FetchError;

/// Ad-redirect prefix stripped from index and download links.
const AD_REDIRECT_PREFIX: &str = "https://adfoc.us/serve/sitelinks/?id=271228&url=";

/// Download link titles in order of preference.
const ARTIFACT_TITLES: [&str; 3] = ["Installer", "Universal", "Server"];

static NAV_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<ul\s[^>]*class\s*=\s*["'][^"']*\bnav-collapsible\b[^"']*["'][^>]*>(.*?)</ul>"#,
    )
});
// `<li>` without attributes; the active entry carries a class and no link.
static PLAIN_ITEM_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<li\s*>\s*<a\s([^>]*)>(.*?)</a>"));
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<a\s([^>]*)>"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<h1[^>]*>(.*?)</h1>"));

/// Source over a scraped installer index, driven through one [`PageSession`].
///
/// A version page counts as loaded once its heading is present; a page
/// without one is a page-ready timeout for that version. A loaded page
/// without any preferred download link yields a build with no location.
pub struct InstallerIndexSource {
    index_url: String,
    session: Mutex<Box<dyn PageSession>>,
    rule: UrlRule,
}

impl std::fmt::Debug for InstallerIndexSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallerIndexSource")
            .field("index_url", &self.index_url)
            .finish_non_exhaustive()
    }
}

impl InstallerIndexSource {
    /// Creates a source rooted at `index_url` that navigates with `session`.
    #[must_use]
    pub fn new(index_url: &str, session: Box<dyn PageSession>) -> Self {
        Self {
            index_url: index_url.to_string(),
            session: Mutex::new(session),
            rule: UrlRule::AsIs,
        }
    }

    async fn load(
        &self,
        url: &str,
        ctx: &SourceContext,
    ) -> Result<Option<PageDocument>, FetchError> {
        let mut session = self.session.lock().await;
        paced(ctx, url, session.load(url, ctx.page_ready_timeout())).await
    }
}

/// Version links from the index's navigation lists, as `(version, url)`.
#[must_use]
pub fn parse_version_links(html: &str, base_url: &str) -> Vec<(String, String)> {
    let base = Url::parse(base_url).ok();

    NAV_LIST_RE
        .captures_iter(html)
        .filter_map(|list| list.get(1))
        .flat_map(|list| PLAIN_ITEM_LINK_RE.captures_iter(list.as_str()))
        .filter_map(|item| {
            let href = attribute(item.get(1)?.as_str(), "href")?;
            let version = element_text(item.get(2).map_or("", |m| m.as_str()));
            if version.is_empty() {
                return None;
            }
            Some((version, resolve_link(&href, base.as_ref())?))
        })
        .collect()
}

/// Preferred download link on a version page (`Installer`, then `Universal`,
/// then `Server`), first occurrence per title.
#[must_use]
pub fn pick_artifact_link(html: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok();
    let anchors: Vec<&str> = ANCHOR_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    ARTIFACT_TITLES.iter().find_map(|wanted| {
        anchors
            .iter()
            .filter(|attrs| attribute(attrs, "title").as_deref() == Some(*wanted))
            .find_map(|attrs| resolve_link(&attribute(attrs, "href")?, base.as_ref()))
    })
}

/// Visible text of the page's first `<h1>`, if any.
fn page_heading(html: &str) -> Option<String> {
    HEADING_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| element_text(m.as_str()))
        .filter(|text| !text.is_empty())
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        if !caps.get(1)?.as_str().eq_ignore_ascii_case(name) {
            return None;
        }
        let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
        Some(decode_entities(value))
    })
}

/// Strips the ad redirect and resolves the link against the page URL.
fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    let target = href.strip_prefix(AD_REDIRECT_PREFIX).unwrap_or(href).trim();
    if target.is_empty() || target.starts_with('#') || target.starts_with("javascript:") {
        return None;
    }
    match base {
        Some(base) => base.join(target).ok().map(String::from),
        None => Url::parse(target).ok().map(String::from),
    }
}

#[async_trait]
impl SourceAdapter for InstallerIndexSource {
    fn name(&self) -> &str {
        "forge"
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Scrape
    }

    fn url_rule(&self) -> &UrlRule {
        &self.rule
    }

    fn index_url(&self) -> &str {
        &self.index_url
    }

    #[instrument(skip(self, ctx), fields(url = %self.index_url))]
    async fn list_versions(&self, ctx: &SourceContext) -> Result<Vec<VersionEntry>, FetchError> {
        let Some(document) = self.load(&self.index_url, ctx).await? else {
            warn!(
                waited_secs = ctx.page_ready_timeout().as_secs(),
                "version index never loaded; enumerating nothing"
            );
            return Ok(Vec::new());
        };

        let links = parse_version_links(&document.html, &document.url);
        if links.is_empty() {
            warn!("version index has no version list; enumerating nothing");
        }
        debug!(count = links.len(), "version links found");
        Ok(links
            .into_iter()
            .map(|(version, url)| VersionEntry::new(version, Channel::Stable, url))
            .collect())
    }

    async fn list_builds(
        &self,
        entry: &VersionEntry,
        ctx: &SourceContext,
    ) -> Result<Vec<BuildCandidate>, FetchError> {
        let not_ready = || FetchError::page_not_ready(&entry.locator, ctx.page_ready_timeout());

        let document = self.load(&entry.locator, ctx).await?.ok_or_else(not_ready)?;
        let Some(heading) = page_heading(&document.html) else {
            return Err(not_ready());
        };
        debug!(%heading, "version page loaded");

        let candidate = match pick_artifact_link(&document.html, &document.url) {
            Some(link) => BuildCandidate::default().with_location(link),
            None => {
                debug!(version = %entry.version, "no installer, universal or server link");
                BuildCandidate::default()
            }
        };
        Ok(vec![candidate])
    }

    async fn release(&self) {
        self.session.lock().await.close().await;
    }
}
