//! Traits at the seams between the pipeline and the outside world

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::expand::LoadMoreControl;

/// A strategy for turning URLs into HTML.
///
/// The pipeline only ever talks to this trait, so a static HTTP fetcher and
/// a headless browser are interchangeable.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetch a page as-is (the category index).
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;

    /// Fetch a category listing page, loading as many offer cards as the
    /// strategy is able to.
    async fn fetch_listing(&self, url: &str) -> Result<String, ScrapeError> {
        self.fetch(url).await
    }

    /// Fetch an offer's own detail page for enrichment.
    async fn fetch_detail(&self, url: &str) -> Result<String, ScrapeError> {
        self.fetch(url).await
    }

    /// Release any held resources. Called once at the end of a run.
    async fn close(&self) {}
}

/// A live, already-loaded listing page that can be driven to load more cards.
#[async_trait]
pub trait ListingPage: Send + Sync {
    async fn scroll_to_bottom(&self) -> Result<(), ScrapeError>;

    /// Click the first element matching `control`, if it is visible.
    ///
    /// Returns `Ok(false)` when nothing matched or the match was hidden.
    async fn click_load_more(&self, control: &LoadMoreControl) -> Result<bool, ScrapeError>;

    /// Number of anchors whose `href` starts with `prefix`.
    async fn count_links(&self, prefix: &str) -> Result<usize, ScrapeError>;

    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
