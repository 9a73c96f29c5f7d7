//! Text and URL normalization shared by every extraction path.

use url::Url;

/// Collapses every whitespace run to a single space and trims both ends.
pub fn safe_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves `href` against `base`.
///
/// Anything already starting with `http` is returned verbatim; blank input
/// stays blank.
pub fn absolute_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if href.starts_with("http") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }

    base.join(href).map_or_else(
        |_| format!("{}{}", base.as_str().trim_end_matches('/'), href),
        |u| u.to_string(),
    )
}

/// The path segment right after `link_prefix`, e.g. `Travel` for
/// `https://host/categories/Travel/flight-deal` with prefix `/categories/`.
///
/// Percent-escapes are decoded. Returns an empty string when the URL has no
/// such segment.
pub fn category_from_url(url: &str, link_prefix: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    let depth = prefix_depth(link_prefix);

    parsed
        .path_segments()
        .and_then(|mut segments| segments.nth(depth))
        .map(|segment| {
            let decoded = urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |d| d.into_owned());
            safe_text(&decoded)
        })
        .unwrap_or_default()
}

/// Number of non-empty segments in a prefix such as `/categories/`.
pub(crate) fn prefix_depth(link_prefix: &str) -> usize {
    link_prefix.split('/').filter(|s| !s.is_empty()).count()
}

/// First whitespace-separated word of `title`. Only used as a last resort
/// when nothing better is known about an offer's brand.
pub fn brand_from_title(title: &str) -> String {
    title.split_whitespace().next().unwrap_or_default().to_string()
}
