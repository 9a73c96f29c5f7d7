//! Plain HTTP fetching with a browser-like user agent

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ScrapeError;
use crate::traits::Fetcher;

/// Fetches pages with a single GET each. Client-side rendered content is
/// not executed, so listing pages yield only their server-rendered cards.
pub struct StaticFetcher {
    client: Client,
}

impl StaticFetcher {
    /// # Errors
    ///
    /// Returns [`ScrapeError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ScrapeError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Network {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ScrapeError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    /// Fetches `url` and deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Network`] or [`ScrapeError::Http`] as for
    /// [`Fetcher::fetch`], and [`ScrapeError::Parse`] when the body is not
    /// valid JSON for `T`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ScrapeError> {
        let body = self.fetch(url).await?;
        serde_json::from_str(&body).map_err(|source| ScrapeError::Parse {
            context: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|source| ScrapeError::Network {
                url: url.to_string(),
                source,
            })
    }
}
