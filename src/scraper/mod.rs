//! HTML extraction: category discovery, offer cards and detail-page metadata.
//!
//! Every function here is synchronous and takes the page as a string. The
//! parsed `Html` is not `Send`, so it must never be held across an await.

pub mod normalize;

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::SiteConfig;
use crate::error::ScrapeError;
use crate::models::Offer;
use normalize::{absolute_url, prefix_depth, safe_text};

/// Candidate title elements inside an offer card, first match in document order.
pub const TITLE_SELECTOR: &str = "h1, h2, h3, h4";
/// Image element inside an offer card.
pub const IMAGE_SELECTOR: &str = "img";
/// Image attributes in priority order; lazy-loading sites leave `src` empty.
pub const IMAGE_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy-src"];
/// Element carrying an explicit brand attribute.
pub const BRAND_ATTR_SELECTOR: &str = "[data-brand]";
pub const BRAND_ATTR: &str = "data-brand";
/// Elements whose text is taken as the brand when no attribute is present.
pub const BRAND_CLASS_SELECTOR: &str = ".brand, .Brand, .offer-brand";

/// What an anchor under the link prefix points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `/categories/<Category>`
    Listing,
    /// `/categories/<Category>/<slug>[/...]`
    Offer,
}

/// Result of category discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Absolute listing page URLs in the order they were found
    pub urls: Vec<String>,
    /// True when the index exposed no listing links and the fallback list was used
    pub degraded: bool,
}

/// Metadata read from an offer's own detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub og_title: String,
    pub og_image: String,
    pub title_tag: String,
    pub brand: String,
}

/// Compiled selectors plus the site knowledge needed to classify links.
pub struct Scraper {
    base: Url,
    link_prefix: String,
    prefix_depth: usize,
    fallback_categories: Vec<String>,
    anchor: Selector,
    title: Selector,
    image: Selector,
    brand_attr: Selector,
    brand_class: Selector,
    og_title: Selector,
    og_image: Selector,
    title_tag: Selector,
}

fn compile(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Selector(format!("{selector}: {e:?}")))
}

fn element_text(el: ElementRef<'_>) -> String {
    safe_text(&el.text().collect::<String>())
}

impl Scraper {
    /// Builds a scraper for `site`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidUrl`] if the base URL does not parse and
    /// [`ScrapeError::Selector`] if a selector fails to compile.
    pub fn new(site: &SiteConfig) -> Result<Self, ScrapeError> {
        let base = Url::parse(&site.base_url).map_err(|e| ScrapeError::InvalidUrl {
            url: site.base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            base,
            link_prefix: site.link_prefix.clone(),
            prefix_depth: prefix_depth(&site.link_prefix),
            fallback_categories: site.fallback_categories.clone(),
            anchor: compile("a[href]")?,
            title: compile(TITLE_SELECTOR)?,
            image: compile(IMAGE_SELECTOR)?,
            brand_attr: compile(BRAND_ATTR_SELECTOR)?,
            brand_class: compile(BRAND_CLASS_SELECTOR)?,
            og_title: compile("meta[property='og:title']")?,
            og_image: compile("meta[property='og:image']")?,
            title_tag: compile("title")?,
        })
    }

    pub fn link_prefix(&self) -> &str {
        &self.link_prefix
    }

    /// Resolves `href` against the site origin.
    pub fn absolute(&self, href: &str) -> String {
        absolute_url(&self.base, href)
    }

    /// Classifies an `href` by how many path segments follow the prefix.
    ///
    /// Blog posts, fragment links and `javascript:` pseudo-links are never
    /// listings or offers.
    pub fn classify(&self, href: &str) -> Option<LinkKind> {
        if !href.starts_with(&self.link_prefix)
            || href.contains("/blog/")
            || href.contains('#')
            || href.contains("javascript:")
        {
            return None;
        }

        let segments = href.split('/').filter(|s| !s.is_empty()).count();
        match segments.checked_sub(self.prefix_depth)? {
            1 => Some(LinkKind::Listing),
            n if n >= 2 => Some(LinkKind::Offer),
            _ => None,
        }
    }

    /// Listing page links on the index page, deduplicated, in document order.
    pub fn listing_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in document.select(&self.anchor) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if self.classify(href) == Some(LinkKind::Listing) && seen.insert(href.to_string()) {
                links.push(self.absolute(href));
            }
        }

        links
    }

    /// Category listing URLs from the index page, or the fallback list when
    /// the page yields none.
    pub fn discover(&self, index_html: &str) -> Discovery {
        let urls = self.listing_links(index_html);
        if !urls.is_empty() {
            return Discovery { urls, degraded: false };
        }

        Discovery {
            urls: self.fallback_urls(),
            degraded: true,
        }
    }

    /// Absolute URLs of the fallback categories.
    pub fn fallback_urls(&self) -> Vec<String> {
        self.fallback_categories
            .iter()
            .map(|name| self.absolute(&format!("{}{}", self.link_prefix, urlencoding::encode(name))))
            .collect()
    }

    /// One offer per anchor shaped like an offer link.
    ///
    /// Fallback order is fixed and first-match-wins:
    /// - title: nested heading text, then the anchor's own text
    /// - image: first nested `img`'s `src`, `data-src`, `data-lazy-src`
    /// - brand: nested `[data-brand]` attribute, then `.brand`-like element text
    ///
    /// Candidates whose title or URL ends up empty are dropped. Duplicates
    /// within the page are kept; the aggregator removes them.
    pub fn extract_offers(&self, html: &str, category: &str) -> Vec<Offer> {
        let document = Html::parse_document(html);
        let mut offers = Vec::new();

        for anchor in document.select(&self.anchor) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if self.classify(href) != Some(LinkKind::Offer) {
                continue;
            }

            let title = self.card_title(anchor);
            let url = self.absolute(href);
            if title.is_empty() || url.is_empty() {
                debug!("Dropping offer card without title or url: {href}");
                continue;
            }

            offers.push(Offer {
                title,
                url,
                category: safe_text(category),
                image: self.card_image(anchor),
                brand: self.brand_within(anchor),
            });
        }

        offers
    }

    /// First heading inside the card, else the anchor's own text.
    ///
    /// A heading that is only whitespace counts as missing and falls through
    /// to the anchor text, so a card with a blank heading but a labelled link
    /// is kept rather than dropped.
    fn card_title(&self, anchor: ElementRef<'_>) -> String {
        anchor
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| element_text(anchor))
    }

    fn card_image(&self, anchor: ElementRef<'_>) -> String {
        anchor
            .select(&self.image)
            .next()
            .and_then(|img| {
                IMAGE_ATTRS
                    .iter()
                    .find_map(|attr| img.value().attr(attr).filter(|v| !v.trim().is_empty()))
            })
            .map(|src| self.absolute(src))
            .unwrap_or_default()
    }

    fn brand_within(&self, scope: ElementRef<'_>) -> String {
        let from_attr = scope
            .select(&self.brand_attr)
            .next()
            .and_then(|el| el.value().attr(BRAND_ATTR))
            .map(safe_text)
            .filter(|b| !b.is_empty());

        from_attr
            .or_else(|| scope.select(&self.brand_class).next().map(element_text))
            .unwrap_or_default()
    }

    /// Open Graph tags, `<title>` and brand heuristic from a detail page.
    pub fn page_metadata(&self, html: &str) -> PageMetadata {
        let document = Html::parse_document(html);
        let content_of = |selector: &Selector| {
            document
                .select(selector)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(safe_text)
                .unwrap_or_default()
        };

        PageMetadata {
            og_title: content_of(&self.og_title),
            og_image: content_of(&self.og_image),
            title_tag: document
                .select(&self.title_tag)
                .next()
                .map(element_text)
                .unwrap_or_default(),
            brand: self.brand_within(document.root_element()),
        }
    }
}
