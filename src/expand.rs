//! Infinite-scroll and "load more" expansion of a category listing page.

use tracing::{debug, info};

use crate::config::ExpandConfig;
use crate::error::ScrapeError;
use crate::traits::ListingPage;

/// One known shape of a "load more" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadMoreControl {
    /// CSS selector for candidate elements
    pub css: &'static str,
    /// Case-insensitive substring the element's text must contain
    pub text: Option<&'static str>,
}

/// Controls tried each iteration, in priority order. The first one whose
/// first match is visible gets clicked.
pub const LOAD_MORE_CONTROLS: [LoadMoreControl; 6] = [
    LoadMoreControl { css: "button", text: Some("Load More") },
    LoadMoreControl { css: "button", text: Some("Load More Offers") },
    LoadMoreControl { css: "button", text: Some("Load More Articles") },
    LoadMoreControl { css: "div", text: Some("Load More") },
    LoadMoreControl { css: ".ThemeThreePagination button", text: None },
    LoadMoreControl { css: ".ThemeThreePagination .lodemorecontent button", text: None },
];

/// What an expansion run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandReport {
    pub iterations: u32,
    pub clicks: u32,
    pub links: usize,
}

/// Scrolls and clicks "load more" until the page stops growing.
///
/// Each iteration scrolls to the bottom, waits, then clicks the first
/// visible control from [`LOAD_MORE_CONTROLS`]. The loop stops early when
/// the number of prefix links did not grow and nothing was clicked, and
/// never runs more than `config.max_iterations` times.
///
/// Click failures are treated as "not clicked". Scroll and count failures
/// abort the expansion.
///
/// # Errors
///
/// Propagates errors from [`ListingPage::scroll_to_bottom`] and
/// [`ListingPage::count_links`].
pub async fn expand<P: ListingPage + ?Sized>(
    page: &P,
    link_prefix: &str,
    config: &ExpandConfig,
) -> Result<ExpandReport, ScrapeError> {
    let mut report = ExpandReport::default();
    let mut last_count = 0;

    for _ in 0..config.max_iterations {
        report.iterations += 1;

        page.scroll_to_bottom().await?;
        page.pause(config.scroll_delay).await;

        let mut clicked = false;
        for control in &LOAD_MORE_CONTROLS {
            match tokio::time::timeout(config.click_timeout, page.click_load_more(control)).await {
                Ok(Ok(true)) => {
                    clicked = true;
                    report.clicks += 1;
                    page.pause(config.click_delay).await;
                    break;
                }
                Ok(Ok(false)) => {}
                Ok(Err(e)) => debug!("Load more click on {} failed: {e}", control.css),
                Err(_) => debug!("Load more click on {} timed out", control.css),
            }
        }

        let current = page.count_links(link_prefix).await?;
        report.links = current;

        if current <= last_count && !clicked {
            break;
        }
        last_count = current;
    }

    info!(
        "Expanded listing in {} iterations ({} clicks, {} links)",
        report.iterations, report.clicks, report.links
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// A page that reveals a scripted link count per iteration and exposes a
    /// clickable control while `clickable` says so.
    struct ScriptedPage {
        counts: Vec<usize>,
        clickable: Vec<bool>,
        visible_control: LoadMoreControl,
        iteration: Mutex<usize>,
        clicked_controls: Mutex<Vec<LoadMoreControl>>,
        attempted: Mutex<Vec<LoadMoreControl>>,
    }

    impl ScriptedPage {
        fn new(counts: Vec<usize>, clickable: Vec<bool>) -> Self {
            Self {
                counts,
                clickable,
                visible_control: LOAD_MORE_CONTROLS[0],
                iteration: Mutex::new(0),
                clicked_controls: Mutex::new(Vec::new()),
                attempted: Mutex::new(Vec::new()),
            }
        }

        fn current(&self) -> usize {
            *self.iteration.lock().unwrap()
        }
    }

    #[async_trait]
    impl ListingPage for ScriptedPage {
        async fn scroll_to_bottom(&self) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn click_load_more(&self, control: &LoadMoreControl) -> Result<bool, ScrapeError> {
            self.attempted.lock().unwrap().push(*control);
            let i = self.current();
            let available = self.clickable.get(i).copied().unwrap_or(false);
            if available && *control == self.visible_control {
                self.clicked_controls.lock().unwrap().push(*control);
                return Ok(true);
            }
            if control.css == "div" {
                return Err(ScrapeError::Browser("detached node".to_string()));
            }
            Ok(false)
        }

        async fn count_links(&self, prefix: &str) -> Result<usize, ScrapeError> {
            assert_eq!(prefix, "/categories/");
            let mut i = self.iteration.lock().unwrap();
            let count = self.counts.get(*i).copied().unwrap_or(*self.counts.last().unwrap());
            *i += 1;
            Ok(count)
        }
    }

    fn fast_config(max_iterations: u32) -> ExpandConfig {
        ExpandConfig {
            max_iterations,
            scroll_delay: Duration::ZERO,
            click_delay: Duration::ZERO,
            click_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn stops_when_nothing_grows_and_nothing_was_clicked() {
        let page = ScriptedPage::new(vec![10, 20, 20, 99], vec![false; 4]);
        let report = expand(&page, "/categories/", &fast_config(60)).await.unwrap();
        assert_eq!(report, ExpandReport { iterations: 3, clicks: 0, links: 20 });
    }

    #[tokio::test]
    async fn a_click_keeps_the_loop_alive_without_growth() {
        let page = ScriptedPage::new(vec![10, 10, 10, 10], vec![true, true, false, false]);
        let report = expand(&page, "/categories/", &fast_config(60)).await.unwrap();
        assert_eq!(report.iterations, 3);
        assert_eq!(report.clicks, 2);
    }

    #[tokio::test]
    async fn iteration_cap_bounds_the_loop() {
        let counts: Vec<usize> = (1..=100).collect();
        let page = ScriptedPage::new(counts, vec![true; 100]);
        let report = expand(&page, "/categories/", &fast_config(5)).await.unwrap();
        assert_eq!(report.iterations, 5);
        assert_eq!(report.links, 5);
    }

    #[tokio::test]
    async fn first_visible_control_wins_and_later_ones_are_not_tried() {
        let mut page = ScriptedPage::new(vec![1, 1], vec![true, false]);
        page.visible_control = LOAD_MORE_CONTROLS[4];
        expand(&page, "/categories/", &fast_config(60)).await.unwrap();

        let attempted = page.attempted.lock().unwrap().clone();
        // first iteration stops at index 4, second tries all six
        assert_eq!(&attempted[..5], &LOAD_MORE_CONTROLS[..5]);
        assert_eq!(attempted.len(), 5 + LOAD_MORE_CONTROLS.len());
        assert_eq!(*page.clicked_controls.lock().unwrap(), vec![LOAD_MORE_CONTROLS[4]]);
    }

    #[test]
    fn control_priority_is_pinned() {
        let shapes: Vec<_> = LOAD_MORE_CONTROLS.iter().map(|c| (c.css, c.text)).collect();
        assert_eq!(
            shapes,
            vec![
                ("button", Some("Load More")),
                ("button", Some("Load More Offers")),
                ("button", Some("Load More Articles")),
                ("div", Some("Load More")),
                (".ThemeThreePagination button", None),
                (".ThemeThreePagination .lodemorecontent button", None),
            ]
        );
    }
}
