//! Fetcher strategies: plain HTTP and headless browser

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;

#[cfg(feature = "browser")]
pub use browser::RenderedFetcher;
pub use http::StaticFetcher;

use crate::config::{AppConfig, FetchMode};
use crate::error::ScrapeError;
use crate::traits::Fetcher;

/// Builds the fetcher selected by `config.fetch_mode`.
///
/// # Errors
///
/// Returns [`ScrapeError::Client`] if the HTTP client cannot be built and
/// [`ScrapeError::Browser`] if the browser cannot be launched (or the crate
/// was built without the `browser` feature).
pub async fn build_fetcher(config: &AppConfig) -> Result<Box<dyn Fetcher>, ScrapeError> {
    match config.fetch_mode {
        FetchMode::Static => Ok(Box::new(StaticFetcher::new(
            &config.site.user_agent,
            config.request_timeout,
        )?)),
        #[cfg(feature = "browser")]
        FetchMode::Rendered => Ok(Box::new(RenderedFetcher::launch(config).await?)),
        #[cfg(not(feature = "browser"))]
        FetchMode::Rendered => Err(ScrapeError::Browser(
            "rendered fetching requires the `browser` feature".to_string(),
        )),
    }
}
