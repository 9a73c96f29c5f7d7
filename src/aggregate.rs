//! Merging per-category results into the final payload

use std::cmp::Ordering;
use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::models::{Offer, OfferSet};

/// Drops offers whose URL was already seen; the first occurrence wins.
/// Offers with a blank URL are dropped as well.
pub fn dedupe_by_url(offers: impl IntoIterator<Item = Offer>) -> Vec<Offer> {
    let mut seen = HashSet::new();
    offers
        .into_iter()
        .filter(|offer| !offer.url.is_empty() && seen.insert(offer.url.clone()))
        .collect()
}

/// Letters with their accents stripped, case-folded. This is the primary
/// collation key: `É` sorts with `e`, `a` with `A`.
fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

/// Compares strings the way a human-facing list is ordered.
///
/// Base letters decide first, ignoring accents and case. Ties are broken by
/// accents (unaccented first), then by case (lowercase first).
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| {
            a.nfd()
                .flat_map(char::to_lowercase)
                .cmp(b.nfd().flat_map(char::to_lowercase))
        })
        .then_with(|| {
            a.chars()
                .zip(b.chars())
                .map(|(x, y)| match (x.is_lowercase(), y.is_lowercase()) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => Ordering::Equal,
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
}

/// Stable sort by category; equal categories keep their relative order.
pub fn sort_by_category(offers: &mut [Offer]) {
    offers.sort_by(|a, b| locale_cmp(&a.category, &b.category));
}

/// Flattens per-category lists (in processing order), deduplicates by URL,
/// sorts by category and stamps the result.
pub fn aggregate(lists: impl IntoIterator<Item = Vec<Offer>>) -> OfferSet {
    let mut offers = dedupe_by_url(lists.into_iter().flatten());
    sort_by_category(&mut offers);
    OfferSet::new(offers)
}
