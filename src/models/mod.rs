//! Data models for scraped offers and the payloads built from them

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A promotional offer listing.
///
/// Unknown `image`/`brand` are empty strings, never `null`. A `null` in a
/// stored file reads back as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Offer {
    #[serde(deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub image: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub brand: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Offer {
    /// True when any field the enricher can fill is blank.
    pub fn needs_enrichment(&self) -> bool {
        self.title.is_empty() || self.image.is_empty() || self.brand.is_empty()
    }
}

/// The payload written to disk after a scrape run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSet {
    pub ok: bool,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub offers: Vec<Offer>,
}

impl OfferSet {
    /// Wraps an already deduplicated and sorted list, stamping the current time.
    pub fn new(offers: Vec<Offer>) -> Self {
        Self {
            ok: true,
            updated_at: Utc::now(),
            count: offers.len(),
            offers,
        }
    }
}

/// `2024-05-01T10:00:00.000Z`, the shape JavaScript's `toISOString` produces.
fn serialize_iso_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// The stored file as read back by the API.
///
/// Older writers produced only `updatedAt` and `offers`, so `ok` and
/// `count` are optional and never trusted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOffers {
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub offers: Option<Vec<Offer>>,
}

/// Successful read API body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffersResponse {
    pub ok: bool,
    pub updated_at: Option<String>,
    pub count: usize,
    pub offers: Vec<Offer>,
}

impl From<StoredOffers> for OffersResponse {
    fn from(stored: StoredOffers) -> Self {
        let offers = stored.offers.unwrap_or_default();
        Self {
            ok: true,
            updated_at: stored.updated_at.filter(|s| !s.is_empty()),
            count: offers.len(),
            offers,
        }
    }
}

/// Failed read API body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}
