//! Harvest pipeline
//!
//! This module contains the four-phase harvest pipeline and its shared
//! plumbing:
//! - `fetcher` - retrying HTTP fetches behind the shared concurrency gate
//! - `page_count` - rendered page-count discovery for a search
//! - `harvester` - listing-link collection across result pages
//! - `extractor` - per-listing field extraction and the phone-reveal protocol
//! - `metrics` - failure and progress counters for the run report
//! - `pipeline` - phase ordering and persistence

mod extractor;
mod fetcher;
mod harvester;
mod metrics;
mod page_count;
mod pipeline;

pub use extractor::{
    extract_listing, normalize_phone, parse_listing_document, phone_reveal_url, reveal_phone,
    ListingFields, PhoneOutcome,
};
pub use fetcher::{build_http_client, fetch_with_retry, gated_fetch, FetchFailure};
pub use harvester::{collect_listing_links, parse_listing_links};
pub use metrics::{HarvestMetrics, HarvestReport};
pub use page_count::{count_result_pages, parse_total_pages};
pub use pipeline::{harvest, Harvester};
