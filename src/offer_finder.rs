use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aggregate::{aggregate, dedupe_by_url};
use crate::config::AppConfig;
use crate::enrich::{Enricher, fill_brand_from_title};
use crate::error::ScrapeError;
use crate::fetchers::build_fetcher;
use crate::models::{Offer, OfferSet};
use crate::scraper::Scraper;
use crate::scraper::normalize::category_from_url;
use crate::store;
use crate::traits::Fetcher;

const ENRICH_PROGRESS_EVERY: usize = 20;

/// Runs the whole scrape: discover, extract, dedupe, enrich, aggregate.
pub struct OfferFinder {
    fetcher: Box<dyn Fetcher>,
    scraper: Scraper,
    index_url: String,
    output_path: PathBuf,
    enrich: bool,
    brand_from_title: bool,
}

impl OfferFinder {
    /// # Errors
    ///
    /// Fails if the site configuration cannot produce a [`Scraper`].
    pub fn new(config: &AppConfig, fetcher: Box<dyn Fetcher>) -> Result<Self, ScrapeError> {
        Ok(Self {
            fetcher,
            scraper: Scraper::new(&config.site)?,
            index_url: config.site.index_url.clone(),
            output_path: config.output_path.clone(),
            enrich: config.enrich,
            brand_from_title: config.brand_from_title,
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Category listing URLs, or the fallback set when the index has none.
    ///
    /// # Errors
    ///
    /// A failed index fetch is returned as-is; only an index without
    /// listing links degrades to the fallback categories.
    pub async fn discover_categories(&self) -> Result<Vec<String>, ScrapeError> {
        info!("Discovering category listing pages from {}", self.index_url);
        let html = self.fetcher.fetch(&self.index_url).await?;
        let discovery = self.scraper.discover(&html);

        if discovery.degraded {
            warn!("Could not discover category listing pages, falling back to known categories");
        }
        info!("Found {} category pages", discovery.urls.len());
        Ok(discovery.urls)
    }

    /// Offers on one category listing page.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error for this category.
    pub async fn scrape_category(&self, category_url: &str) -> Result<Vec<Offer>, ScrapeError> {
        let html = self.fetcher.fetch_listing(category_url).await?;
        let category = category_from_url(category_url, self.scraper.link_prefix());
        Ok(self.scraper.extract_offers(&html, &category))
    }

    /// Scrapes every category in turn; a failing category is logged and skipped.
    pub async fn scrape_categories(&self, category_urls: &[String]) -> Vec<Vec<Offer>> {
        let mut per_category = Vec::with_capacity(category_urls.len());

        for url in category_urls {
            info!("Scraping category: {url}");
            match self.scrape_category(url).await {
                Ok(offers) => {
                    info!("Found {} offers in {url}", offers.len());
                    per_category.push(offers);
                }
                Err(e) => warn!("Failed category {url}: {e}"),
            }
        }

        per_category
    }

    /// Fills missing fields one offer at a time.
    pub async fn enrich_offers(&self, offers: Vec<Offer>) -> Vec<Offer> {
        if !self.enrich {
            return offers
                .into_iter()
                .map(|mut offer| {
                    if self.brand_from_title {
                        fill_brand_from_title(&mut offer);
                    }
                    offer
                })
                .collect();
        }

        info!("Enriching missing fields (best effort)");
        let enricher = Enricher::new(self.fetcher.as_ref(), &self.scraper, self.brand_from_title);
        let mut enriched = 0;
        let mut result = Vec::with_capacity(offers.len());

        for offer in offers {
            if offer.needs_enrichment() {
                result.push(enricher.enrich(offer).await);
                enriched += 1;
                if enriched % ENRICH_PROGRESS_EVERY == 0 {
                    info!("Enriched {enriched} offers");
                }
            } else {
                result.push(offer);
            }
        }

        result
    }

    /// Produces a fresh payload without touching the output file.
    ///
    /// # Errors
    ///
    /// Fails only when category discovery itself fails.
    pub async fn run(&self) -> Result<OfferSet> {
        info!("Starting scrape with the {} fetcher", self.fetcher.name());

        let category_urls = self
            .discover_categories()
            .await
            .context("category discovery failed")?;
        let per_category = self.scrape_categories(&category_urls).await;

        let unique = dedupe_by_url(per_category.into_iter().flatten());
        let enriched = self.enrich_offers(unique).await;

        Ok(aggregate([enriched]))
    }

    /// Runs a scrape and overwrites the output file with the result.
    ///
    /// # Errors
    ///
    /// Fails when discovery fails or the payload cannot be written.
    pub async fn run_and_persist(&self) -> Result<OfferSet> {
        let offer_set = self.run().await?;
        store::persist(&offer_set, &self.output_path)
            .await
            .with_context(|| format!("failed to write {}", self.output_path.display()))?;
        Ok(offer_set)
    }

    /// Releases the fetcher's resources (closes the browser).
    pub async fn shutdown(&self) {
        self.fetcher.close().await;
    }
}

/// One complete run with a freshly built fetcher, closed afterwards even when
/// the run fails. Every call starts a new browser in rendered mode, so a
/// crashed browser does not outlive the run it broke.
///
/// # Errors
///
/// Fails when the fetcher cannot be built, discovery fails or the payload
/// cannot be written.
pub async fn scrape_once(config: &AppConfig) -> Result<OfferSet> {
    let fetcher = build_fetcher(config).await.context("failed to start fetcher")?;
    let finder = OfferFinder::new(config, fetcher)?;

    let result = finder.run_and_persist().await;
    finder.shutdown().await;
    result
}
