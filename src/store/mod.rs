//! The JSON file shared by the scraper (writer) and the API (reader).

use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::{OfferSet, StoredOffers};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ScrapeError + '_ {
    move |source| ScrapeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `offer_set` as 2-space indented JSON, replacing `path` wholesale.
///
/// Parent directories are created as needed. The payload is written to a
/// sibling temp file first and renamed into place, so readers never see a
/// partially written file.
///
/// # Errors
///
/// Returns [`ScrapeError::Io`] if any filesystem step fails.
pub async fn persist(offer_set: &OfferSet, path: &Path) -> Result<(), ScrapeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_error(parent))?;
    }

    let json = serde_json::to_string_pretty(offer_set).map_err(|source| ScrapeError::Parse {
        context: "offer payload".to_string(),
        source,
    })?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, json).await.map_err(io_error(&tmp_path))?;
    if let Err(source) = fs::rename(&tmp_path, path).await {
        if let Err(e) = fs::remove_file(&tmp_path).await {
            warn!("Could not remove {}: {e}", tmp_path.display());
        }
        return Err(io_error(path)(source));
    }

    info!("Saved {} offers to {}", offer_set.count, path.display());
    Ok(())
}

/// Reads the stored payload. Both the minimal `{ updatedAt, offers }` shape
/// and the full shape are accepted; an empty file reads as no offers.
///
/// # Errors
///
/// Returns [`ScrapeError::Io`] if the file cannot be read and
/// [`ScrapeError::Parse`] if it is not valid JSON of the expected shape.
pub async fn load(path: &Path) -> Result<StoredOffers, ScrapeError> {
    let raw = fs::read_to_string(path).await.map_err(io_error(path))?;
    if raw.trim().is_empty() {
        return Ok(StoredOffers::default());
    }

    serde_json::from_str(&raw).map_err(|source| ScrapeError::Parse {
        context: path.display().to_string(),
        source,
    })
}
