//! Importing offers from a JSON feed instead of scraping HTML.

use serde::Deserialize;
use tracing::info;

use crate::aggregate::aggregate;
use crate::error::ScrapeError;
use crate::fetchers::StaticFetcher;
use crate::models::{Offer, OfferSet};
use crate::scraper::Scraper;
use crate::scraper::normalize::{category_from_url, safe_text};

/// A feed is either `{ "offers": [...] }` or a bare array of offers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedPayload {
    Wrapped { offers: Vec<FeedOffer> },
    Bare(Vec<FeedOffer>),
}

impl FeedPayload {
    pub fn into_offers(self) -> Vec<FeedOffer> {
        match self {
            Self::Wrapped { offers } | Self::Bare(offers) => offers,
        }
    }
}

/// One record as found in a feed; every field may be missing or `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedOffer {
    pub title: Option<String>,
    #[serde(alias = "href", alias = "link")]
    pub url: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "img", alias = "imageUrl")]
    pub image: Option<String>,
    pub brand: Option<String>,
}

/// Applies the same normalization as HTML extraction. Returns `None` for
/// records without a usable title or URL.
pub fn normalize_feed_offer(raw: FeedOffer, scraper: &Scraper) -> Option<Offer> {
    let title = safe_text(raw.title.as_deref().unwrap_or_default());
    let url = scraper.absolute(raw.url.as_deref().unwrap_or_default());
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let category = raw
        .category
        .as_deref()
        .map(safe_text)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| category_from_url(&url, scraper.link_prefix()));

    Some(Offer {
        title,
        url,
        category,
        image: scraper.absolute(raw.image.as_deref().unwrap_or_default()),
        brand: safe_text(raw.brand.as_deref().unwrap_or_default()),
    })
}

/// Fetches a feed and turns it into a sorted, deduplicated payload.
///
/// # Errors
///
/// Network, HTTP status and [`ScrapeError::Parse`] errors from the fetch.
pub async fn import(
    fetcher: &StaticFetcher,
    scraper: &Scraper,
    feed_url: &str,
) -> Result<OfferSet, ScrapeError> {
    info!("Importing offers from feed {feed_url}");
    let payload: FeedPayload = fetcher.fetch_json(feed_url).await?;

    let raw = payload.into_offers();
    let total = raw.len();
    let offers: Vec<Offer> = raw
        .into_iter()
        .filter_map(|r| normalize_feed_offer(r, scraper))
        .collect();

    info!("Feed yielded {} usable offers out of {total}", offers.len());
    Ok(aggregate([offers]))
}
