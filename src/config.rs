//! Runtime configuration, read from the environment (and `.env`).
//!
//! Every component receives the slice of configuration it needs at
//! construction time; nothing reads the environment after startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://www.timesprime.com";
pub const DEFAULT_LINK_PREFIX: &str = "/categories/";
pub const DEFAULT_OUTPUT_PATH: &str = "data/offers.json";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome Safari";

/// Categories used when the index page exposes no listing links.
pub const FALLBACK_CATEGORIES: [&str; 8] = [
    "Travel",
    "Food",
    "Entertainment",
    "Shopping",
    "Health",
    "Learning",
    "Finance",
    "Lifestyle",
];

/// How pages are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FetchMode {
    /// Plain HTTP GET; no client-side rendering.
    Static,
    /// Headless Chromium with scrolling and "load more" expansion.
    Rendered,
}

impl FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "http" => Ok(Self::Static),
            "rendered" | "browser" => Ok(Self::Rendered),
            other => Err(format!("unknown fetch mode \"{other}\" (expected static or rendered)")),
        }
    }
}

/// Site-specific knowledge: where to start and what links look like.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Origin that relative hrefs and image paths resolve against
    pub base_url: String,
    /// Page listing all categories
    pub index_url: String,
    /// Path prefix shared by listing and offer links, e.g. `/categories/`
    pub link_prefix: String,
    /// Category names used in degraded mode
    pub fallback_categories: Vec<String>,
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index_url: format!("{DEFAULT_BASE_URL}/categories"),
            link_prefix: DEFAULT_LINK_PREFIX.to_string(),
            fallback_categories: FALLBACK_CATEGORIES.iter().map(ToString::to_string).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Bounds and pacing for the listing expansion loop.
#[derive(Debug, Clone)]
pub struct ExpandConfig {
    pub max_iterations: u32,
    pub scroll_delay: Duration,
    pub click_delay: Duration,
    pub click_timeout: Duration,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            max_iterations: 60,
            scroll_delay: Duration::from_millis(800),
            click_delay: Duration::from_millis(1200),
            click_timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub output_path: PathBuf,
    pub fetch_mode: FetchMode,
    pub enrich: bool,
    pub brand_from_title: bool,
    pub request_timeout: Duration,
    pub settle_delay: Duration,
    pub detail_settle_delay: Duration,
    pub expand: ExpandConfig,
    pub chrome_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub schedule: String,
    pub log_level: String,
}

/// Loads configuration from the process environment after reading `.env`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] when a variable is set to a value
/// that cannot be parsed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_config(|key| std::env::var(key).ok())
}

/// Builds configuration from an arbitrary key lookup so tests can feed a map
/// instead of mutating the process environment.
pub fn build_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let parse = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = get(var).unwrap_or_else(|| default.to_string());
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match get(var) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: format!("expected a boolean, got \"{raw}\""),
                }),
            },
        }
    };

    let base_url = get("OFFERS_BASE_URL")
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string();
    let index_url = get("OFFERS_INDEX_URL").unwrap_or_else(|| format!("{base_url}/categories"));

    let mut link_prefix = get("OFFERS_LINK_PREFIX").unwrap_or_else(|| DEFAULT_LINK_PREFIX.to_string());
    if !link_prefix.starts_with('/') {
        link_prefix.insert(0, '/');
    }
    if !link_prefix.ends_with('/') {
        link_prefix.push('/');
    }

    let fallback_categories = get("OFFERS_FALLBACK_CATEGORIES").map_or_else(
        || FALLBACK_CATEGORIES.iter().map(ToString::to_string).collect(),
        |raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        },
    );

    let fetch_mode = match get("OFFERS_FETCH_MODE") {
        None => FetchMode::Rendered,
        Some(raw) => raw.parse().map_err(|reason| ConfigError::InvalidEnvVar {
            var: "OFFERS_FETCH_MODE".to_string(),
            reason,
        })?,
    };

    let bind_raw = get("OFFERS_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string());
    let bind_addr = bind_raw
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "OFFERS_BIND_ADDR".to_string(),
            reason: e.to_string(),
        })?;

    Ok(AppConfig {
        site: SiteConfig {
            base_url,
            index_url,
            link_prefix,
            fallback_categories,
            user_agent: get("OFFERS_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        },
        output_path: PathBuf::from(
            get("OFFERS_OUTPUT_PATH").unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string()),
        ),
        fetch_mode,
        enrich: parse_bool("OFFERS_ENRICH", true)?,
        brand_from_title: parse_bool("OFFERS_BRAND_FROM_TITLE", false)?,
        request_timeout: Duration::from_secs(parse("OFFERS_REQUEST_TIMEOUT_SECS", "30")?),
        settle_delay: Duration::from_millis(parse("OFFERS_SETTLE_MS", "1500")?),
        detail_settle_delay: Duration::from_millis(parse("OFFERS_DETAIL_SETTLE_MS", "800")?),
        expand: ExpandConfig {
            max_iterations: u32::try_from(parse("OFFERS_EXPAND_MAX_ITERATIONS", "60")?).map_err(
                |e| ConfigError::InvalidEnvVar {
                    var: "OFFERS_EXPAND_MAX_ITERATIONS".to_string(),
                    reason: e.to_string(),
                },
            )?,
            scroll_delay: Duration::from_millis(parse("OFFERS_EXPAND_SCROLL_DELAY_MS", "800")?),
            click_delay: Duration::from_millis(parse("OFFERS_EXPAND_CLICK_DELAY_MS", "1200")?),
            click_timeout: Duration::from_millis(parse("OFFERS_EXPAND_CLICK_TIMEOUT_MS", "2000")?),
        },
        chrome_path: get("OFFERS_CHROME_PATH").map(PathBuf::from),
        bind_addr,
        schedule: get("OFFERS_SCHEDULE").unwrap_or_else(|| "0 0 */6 * * *".to_string()),
        log_level: get("OFFERS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        build_config(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_reference_site() {
        let config = config_from(&[]).expect("defaults parse");
        assert_eq!(config.site.base_url, "https://www.timesprime.com");
        assert_eq!(config.site.index_url, "https://www.timesprime.com/categories");
        assert_eq!(config.site.link_prefix, "/categories/");
        assert_eq!(config.site.fallback_categories.len(), 8);
        assert_eq!(config.output_path, PathBuf::from("data/offers.json"));
        assert_eq!(config.fetch_mode, FetchMode::Rendered);
        assert!(config.enrich);
        assert!(!config.brand_from_title);
        assert_eq!(config.expand.max_iterations, 60);
        assert_eq!(config.expand.click_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn index_url_follows_overridden_base() {
        let config = config_from(&[("OFFERS_BASE_URL", "http://localhost:8080/")]).unwrap();
        assert_eq!(config.site.base_url, "http://localhost:8080");
        assert_eq!(config.site.index_url, "http://localhost:8080/categories");
    }

    #[test]
    fn link_prefix_is_slash_wrapped() {
        let config = config_from(&[("OFFERS_LINK_PREFIX", "deals")]).unwrap();
        assert_eq!(config.site.link_prefix, "/deals/");
    }

    #[test]
    fn fallback_categories_split_on_commas() {
        let config = config_from(&[("OFFERS_FALLBACK_CATEGORIES", "Travel, Food,,")]).unwrap();
        assert_eq!(config.site.fallback_categories, vec!["Travel", "Food"]);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[("OFFERS_SETTLE_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("OFFERS_SETTLE_MS"));

        let err = config_from(&[("OFFERS_FETCH_MODE", "carrier-pigeon")]).unwrap_err();
        assert!(err.to_string().contains("OFFERS_FETCH_MODE"));

        let err = config_from(&[("OFFERS_ENRICH", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("OFFERS_ENRICH"));
    }

    #[test]
    fn fetch_mode_accepts_aliases() {
        assert_eq!("HTTP".parse::<FetchMode>(), Ok(FetchMode::Static));
        assert_eq!("browser".parse::<FetchMode>(), Ok(FetchMode::Rendered));
    }
}
