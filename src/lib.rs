//! Scrapes promotional offer listings into a JSON file and serves that file
//! over a small read-only API.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod enrich;
pub mod error;
pub mod expand;
pub mod feed;
pub mod fetchers;
pub mod models;
pub mod offer_finder;
pub mod scraper;
pub mod store;
pub mod traits;

pub use error::{ConfigError, ScrapeError};
pub use models::{Offer, OfferSet};
pub use offer_finder::OfferFinder;
pub use traits::{Fetcher, ListingPage};
