//! Result-page count discovery
//!
//! The catalog populates the result count and the pagination widget from
//! client-side script, so neither is present in the raw document. This module
//! drives a headless browser load of the search page, waits for the marker
//! element that signals the count has rendered, then reads the page count from
//! the pagination controls. A render failure (including timeout waiting for
//! the marker) is fatal to the run; there is no retry at this stage.

use headless_chrome::{Browser, LaunchOptions};
use scraper::{Html, Selector};
use tokio::task;

use crate::{HarvestError, Result};

/// Element that appears once the client-side result count has rendered.
const RESULT_COUNT_MARKER: &str = "span#staticResultsCount";

/// Pagination entries carrying a numeric `data-page` attribute.
const PAGE_LINK_SELECTOR: &str = "#searchPagination .page-item.mhide a.page-link";

/// Determines the total number of result pages for a base search URL
///
/// Loads `{base_url}&size={page_size}` in a headless browser, waits for the
/// rendered result count, and returns the highest page index found in the
/// pagination controls (1 when no pagination is present).
pub async fn count_result_pages(base_url: &str, page_size: u32) -> Result<u32> {
    let url = format!("{}&size={}", base_url, page_size);
    let html = task::spawn_blocking(move || render_search_page(&url)).await??;
    Ok(parse_total_pages(&html))
}

/// Performs the full browser-style page load and returns the rendered document.
fn render_search_page(url: &str) -> Result<String> {
    let browser = Browser::new(LaunchOptions {
        headless: true,
        ..Default::default()
    })
    .map_err(|e| render_error(url, format!("browser launch failed: {}", e)))?;

    let tab = browser
        .new_tab()
        .map_err(|e| render_error(url, format!("tab creation failed: {}", e)))?;

    tab.navigate_to(url)
        .map_err(|e| render_error(url, format!("navigation failed: {}", e)))?;
    tab.wait_until_navigated()
        .map_err(|e| render_error(url, format!("navigation never settled: {}", e)))?;

    tab.wait_for_element(RESULT_COUNT_MARKER)
        .map_err(|e| render_error(url, format!("result count never rendered: {}", e)))?;

    tab.get_content()
        .map_err(|e| render_error(url, format!("could not read document: {}", e)))
}

fn render_error(url: &str, message: String) -> HarvestError {
    HarvestError::Render {
        url: url.to_string(),
        message,
    }
}

/// Reads the maximum page index from the rendered pagination controls
///
/// Returns 1 when no pagination controls are present (single-page result set).
pub fn parse_total_pages(html: &str) -> u32 {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse(PAGE_LINK_SELECTOR) else {
        return 1;
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("data-page"))
        .filter_map(|page| page.parse::<u32>().ok())
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_total_pages_takes_maximum_index() {
        let html = r#"
            <html><body>
            <span id="staticResultsCount">1 234</span>
            <nav id="searchPagination">
                <span class="page-item mhide"><a class="page-link" data-page="1">1</a></span>
                <span class="page-item mhide"><a class="page-link" data-page="2">2</a></span>
                <span class="page-item mhide"><a class="page-link" data-page="13">13</a></span>
            </nav>
            </body></html>
        "#;
        assert_eq!(parse_total_pages(html), 13);
    }

    #[test]
    fn test_parse_total_pages_defaults_to_one() {
        let html = r#"<html><body><span id="staticResultsCount">7</span></body></html>"#;
        assert_eq!(parse_total_pages(html), 1);
    }

    #[test]
    fn test_parse_total_pages_ignores_non_numeric_entries() {
        let html = r#"
            <html><body>
            <nav id="searchPagination">
                <span class="page-item mhide"><a class="page-link" data-page="next">»</a></span>
                <span class="page-item mhide"><a class="page-link" data-page="4">4</a></span>
            </nav>
            </body></html>
        "#;
        assert_eq!(parse_total_pages(html), 4);
    }

    #[test]
    fn test_parse_total_pages_ignores_non_mhide_entries() {
        // Mobile-only pagination entries use a different class and must not count.
        let html = r#"
            <html><body>
            <nav id="searchPagination">
                <span class="page-item"><a class="page-link" data-page="99">99</a></span>
                <span class="page-item mhide"><a class="page-link" data-page="3">3</a></span>
            </nav>
            </body></html>
        "#;
        assert_eq!(parse_total_pages(html), 3);
    }
}
