//! Scraped directory listings (`<version>/<build>/server.jar`).

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::session::{ListingRow, PageListing, PageSession, paced};
use super::{BuildCandidate, Channel, SourceAccess, SourceAdapter, SourceContext, VersionEntry};
use crate::resolve::UrlRule;
use crate::transport::FetchError;

const PARENT_DIRECTORY: &str = "[Parent Directory]";

/// Artifact file inside each build directory.
pub const SERVER_JAR: &str = "server.jar";

/// Directory-listing source driven through one exclusively owned [`PageSession`].
///
/// Navigation is serialized through the session lock and paced by the run's
/// throttle. A version listing that never becomes ready enumerates nothing;
/// a build listing that never becomes ready is a page-ready timeout for that
/// version only.
pub struct DirectoryListingSource {
    listing_url: String,
    session: Mutex<Box<dyn PageSession>>,
    rule: UrlRule,
}

impl std::fmt::Debug for DirectoryListingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryListingSource")
            .field("listing_url", &self.listing_url)
            .finish_non_exhaustive()
    }
}

impl DirectoryListingSource {
    /// Creates a source rooted at `listing_url` that navigates with `session`.
    #[must_use]
    pub fn new(listing_url: &str, session: Box<dyn PageSession>) -> Self {
        Self {
            listing_url: listing_url.to_string(),
            session: Mutex::new(session),
            rule: UrlRule::JoinPath {
                file: SERVER_JAR.to_string(),
            },
        }
    }

    async fn open(
        &self,
        url: &str,
        ctx: &SourceContext,
    ) -> Result<PageListing, FetchError> {
        let mut session = self.session.lock().await;
        paced(ctx, url, session.open(url, ctx.page_ready_timeout())).await
    }
}

/// Directory rows only (`name/`), without the parent link.
fn directory_name(row: &ListingRow) -> Option<&str> {
    let text = row.text.trim();
    if text.is_empty() || text == PARENT_DIRECTORY {
        return None;
    }
    text.strip_suffix('/').filter(|name| !name.is_empty())
}

#[async_trait]
impl SourceAdapter for DirectoryListingSource {
    fn name(&self) -> &str {
        "spigot"
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Scrape
    }

    fn url_rule(&self) -> &UrlRule {
        &self.rule
    }

    fn index_url(&self) -> &str {
        &self.listing_url
    }

    #[instrument(skip(self, ctx), fields(url = %self.listing_url))]
    async fn list_versions(&self, ctx: &SourceContext) -> Result<Vec<VersionEntry>, FetchError> {
        let listing = self.open(&self.listing_url, ctx).await?;
        if !listing.ready {
            warn!(
                waited_secs = ctx.page_ready_timeout().as_secs(),
                "version listing never became ready; enumerating nothing"
            );
            return Ok(Vec::new());
        }

        let entries: Vec<VersionEntry> = listing
            .rows
            .iter()
            .filter_map(|row| {
                directory_name(row)
                    .map(|version| VersionEntry::new(version, Channel::Stable, row.href.clone()))
            })
            .collect();
        debug!(count = entries.len(), "version directories found");
        Ok(entries)
    }

    async fn list_builds(
        &self,
        entry: &VersionEntry,
        ctx: &SourceContext,
    ) -> Result<Vec<BuildCandidate>, FetchError> {
        let listing = self.open(&entry.locator, ctx).await?;
        if !listing.ready {
            return Err(FetchError::page_not_ready(
                &entry.locator,
                ctx.page_ready_timeout(),
            ));
        }

        Ok(listing
            .rows
            .iter()
            .filter_map(|row| {
                let name = directory_name(row)?;
                if !name.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let number = name.parse::<u64>().ok()?;
                Some(BuildCandidate::numbered(number).with_location(row.href.clone()))
            })
            .collect())
    }

    async fn release(&self) {
        self.session.lock().await.close().await;
    }
}
