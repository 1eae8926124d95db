//! Link harvest phase
//!
//! Schedules one gated fetch per result page, parses the listing-results
//! container of each, and aggregates the listing links. Page tasks all launch
//! at once and are consumed as they complete, so progress reporting does not
//! depend on page order. A page that exhausts its retries contributes an empty
//! link set; the harvest itself never aborts.
//!
//! Links are not deduplicated here: a listing linked from two result pages is
//! extracted twice and resolved later by the persister's conflict policy.

use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use url::Url;

use crate::config::HarvesterConfig;
use crate::scraper::fetcher::gated_fetch;
use crate::scraper::metrics::HarvestMetrics;
use crate::Result;

/// Anchor elements inside the search-results container whose href is a listing URL.
const LISTING_LINK_SELECTOR: &str = "div#searchResults section.ticket-item a.address[href]";

/// Collects listing links from every result page of a search
///
/// # Arguments
///
/// * `base_url` - The base search URL; `&page={n}&size={page_size}` is appended
/// * `total_pages` - Result-page count discovered by the page counter
pub async fn collect_listing_links(
    client: &Client,
    gate: &Arc<Semaphore>,
    metrics: &Arc<HarvestMetrics>,
    base_url: &str,
    total_pages: u32,
    harvester: &HarvesterConfig,
) -> Result<Vec<String>> {
    let delay = Duration::from_millis(harvester.retry_delay_ms);
    let mut tasks = JoinSet::new();

    for page in 1..=total_pages {
        let client = client.clone();
        let gate = Arc::clone(gate);
        let metrics = Arc::clone(metrics);
        let url = format!("{}&page={}&size={}", base_url, page, harvester.page_size);
        let max_retries = harvester.max_retries;

        tasks.spawn(async move {
            match gated_fetch(&client, gate, &url, max_retries, delay).await {
                Ok(body) => {
                    let parsed =
                        task::spawn_blocking(move || parse_listing_links(&body, &url)).await;
                    match parsed {
                        Ok(links) => (page, links),
                        Err(e) => {
                            tracing::error!("Link parse task failed for page {}: {}", page, e);
                            (page, Vec::new())
                        }
                    }
                }
                Err(failure) => {
                    metrics.record_page_failure();
                    tracing::warn!("Result page {} lost: {}", page, failure);
                    (page, Vec::new())
                }
            }
        });
    }

    let mut links = Vec::new();
    let mut completed = 0u32;

    while let Some(joined) = tasks.join_next().await {
        let (page, page_links) = joined?;
        completed += 1;
        metrics.add_links(page_links.len());
        tracing::info!(
            "Page {}: {} links ({}/{} pages done)",
            page,
            page_links.len(),
            completed,
            total_pages
        );
        links.extend(page_links);
    }

    Ok(links)
}

/// Parses the listing links out of one result page
///
/// Relative hrefs are resolved against the page URL; anything unresolvable is
/// dropped.
pub fn parse_listing_links(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse(LISTING_LINK_SELECTOR) else {
        return Vec::new();
    };

    let base = Url::parse(page_url).ok();

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base.as_ref()))
        .collect()
}

fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }

    base?.join(href).ok().map(|url| url.to_string())
}
