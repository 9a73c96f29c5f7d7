//! Best-effort backfilling of missing offer fields from detail pages.

use tracing::debug;

use crate::models::Offer;
use crate::scraper::normalize::brand_from_title;
use crate::scraper::{PageMetadata, Scraper};
use crate::traits::Fetcher;

pub struct Enricher<'a> {
    fetcher: &'a dyn Fetcher,
    scraper: &'a Scraper,
    brand_from_title: bool,
}

impl<'a> Enricher<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, scraper: &'a Scraper, brand_from_title: bool) -> Self {
        Self {
            fetcher,
            scraper,
            brand_from_title,
        }
    }

    /// Visits the offer's own page and fills blank fields from its metadata.
    ///
    /// Offers with nothing missing are returned untouched without a fetch.
    /// A failed fetch returns the offer unchanged apart from the optional
    /// title-based brand fallback.
    pub async fn enrich(&self, offer: Offer) -> Offer {
        if !offer.needs_enrichment() {
            return offer;
        }

        let mut offer = match self.fetcher.fetch_detail(&offer.url).await {
            Ok(html) => {
                let meta = self.scraper.page_metadata(&html);
                fill_from_metadata(offer, &meta, self.scraper)
            }
            Err(e) => {
                debug!("Enrichment skipped for {}: {e}", offer.url);
                offer
            }
        };

        if self.brand_from_title {
            fill_brand_from_title(&mut offer);
        }
        offer
    }
}

/// Fills only the blank fields of `offer`; present values always win.
pub fn fill_from_metadata(mut offer: Offer, meta: &PageMetadata, scraper: &Scraper) -> Offer {
    if offer.title.is_empty() {
        offer.title = if meta.og_title.is_empty() {
            meta.title_tag.clone()
        } else {
            meta.og_title.clone()
        };
    }
    if offer.image.is_empty() {
        offer.image = scraper.absolute(&meta.og_image);
    }
    if offer.brand.is_empty() {
        offer.brand = meta.brand.clone();
    }
    offer
}

/// Last-resort brand guess: the first word of the title.
pub fn fill_brand_from_title(offer: &mut Offer) {
    if offer.brand.is_empty() {
        offer.brand = brand_from_title(&offer.title);
    }
}
