//! Run orchestration
//!
//! A harvest run is four strictly ordered phases per search: page-count
//! discovery, link harvest, detail extraction, persistence. Each phase
//! finishes completely before the next begins; within a phase, tasks run
//! concurrently under the shared gate and complete in whatever order the
//! network dictates.
//!
//! Only page-count discovery can fail a run. Every later failure is absorbed
//! at the unit that suffered it and surfaces through the run report.

use reqwest::Client;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::listing::Listing;
use crate::scraper::extractor::extract_listing;
use crate::scraper::fetcher::build_http_client;
use crate::scraper::harvester::collect_listing_links;
use crate::scraper::metrics::{HarvestMetrics, HarvestReport};
use crate::scraper::page_count::count_result_pages;
use crate::storage::{open_storage, SqliteStorage, Storage};
use crate::Result;

/// Coordinates one harvest over every configured search
pub struct Harvester {
    config: Arc<Config>,
    config_hash: String,
    client: Client,
    gate: Arc<Semaphore>,
    storage: Arc<Mutex<SqliteStorage>>,
    metrics: Arc<HarvestMetrics>,
}

impl Harvester {
    /// Creates a harvester from a validated configuration
    ///
    /// Opens (or creates) the database and builds the shared HTTP client and
    /// concurrency gate sized from the configuration.
    pub fn new(config: Config, config_hash: String) -> Result<Self> {
        let max_concurrent = config.harvester.max_concurrent_requests as usize;
        let client = build_http_client(max_concurrent)?;
        let storage = open_storage(Path::new(&config.database.path))?;

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            client,
            gate: Arc::new(Semaphore::new(max_concurrent)),
            storage: Arc::new(Mutex::new(storage)),
            metrics: Arc::new(HarvestMetrics::default()),
        })
    }

    /// Runs a full harvest over every configured search
    ///
    /// Discovers the page count for each search with a rendered page load,
    /// then harvests it. A page-count failure aborts the run; everything
    /// downstream degrades per unit instead.
    pub async fn run(&self) -> Result<HarvestReport> {
        let run_id = self.begin_run()?;

        for entry in &self.config.search {
            let total_pages =
                count_result_pages(&entry.url, self.config.harvester.page_size).await?;
            tracing::info!("Search {} spans {} result pages", entry.url, total_pages);

            self.harvest_search(&entry.url, total_pages, run_id).await?;
        }

        self.finish_run(run_id)
    }

    /// Runs a harvest of one search with a page count supplied by the caller
    ///
    /// Skips the rendered page-count load; useful when the page count is
    /// already known.
    pub async fn run_with_page_count(
        &self,
        base_url: &str,
        total_pages: u32,
    ) -> Result<HarvestReport> {
        let run_id = self.begin_run()?;
        self.harvest_search(base_url, total_pages, run_id).await?;
        self.finish_run(run_id)
    }

    /// Harvests one search: link collection, detail extraction, persistence.
    async fn harvest_search(&self, base_url: &str, total_pages: u32, run_id: i64) -> Result<()> {
        let links = collect_listing_links(
            &self.client,
            &self.gate,
            &self.metrics,
            base_url,
            total_pages,
            &self.config.harvester,
        )
        .await?;
        tracing::info!("Collected {} listing links from {}", links.len(), base_url);

        let listings = self.extract_listings(links).await?;
        tracing::info!("Extracted {} listings from {}", listings.len(), base_url);

        self.persist_listings(listings, run_id).await
    }

    /// Extracts every collected listing concurrently under the gate.
    async fn extract_listings(&self, links: Vec<String>) -> Result<Vec<Listing>> {
        let total = links.len();
        let mut tasks = JoinSet::new();

        for url in links {
            let client = self.client.clone();
            let gate = Arc::clone(&self.gate);
            let metrics = Arc::clone(&self.metrics);
            let harvester = self.config.harvester.clone();

            tasks.spawn(extract_listing(client, gate, metrics, url, harvester));
        }

        let mut listings = Vec::new();
        let mut completed = 0usize;

        while let Some(joined) = tasks.join_next().await {
            if let Some(listing) = joined? {
                self.metrics.record_listing_extracted();
                listings.push(listing);
            }
            completed += 1;
            if completed % 25 == 0 || completed == total {
                tracing::info!("Extraction progress: {}/{} listings", completed, total);
            }
        }

        Ok(listings)
    }

    /// Writes extracted listings through the idempotent insert.
    async fn persist_listings(&self, listings: Vec<Listing>, run_id: i64) -> Result<()> {
        let mut tasks = JoinSet::new();

        for listing in listings {
            let storage = Arc::clone(&self.storage);
            let metrics = Arc::clone(&self.metrics);

            tasks.spawn_blocking(move || {
                // A poisoned lock still guards a consistent connection; keep writing.
                let mut storage = storage
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                match storage.insert_listing(&listing, run_id) {
                    Ok(true) => metrics.record_row_inserted(),
                    Ok(false) => metrics.record_row_duplicate(),
                    Err(e) => {
                        metrics.record_write_error();
                        tracing::error!("Failed to persist {}: {}", listing.url, e);
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined?;
        }

        Ok(())
    }

    fn begin_run(&self) -> Result<i64> {
        let mut storage = self
            .storage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let run_id = storage.create_run(&self.config_hash)?;
        tracing::info!("Started harvest run {}", run_id);
        Ok(run_id)
    }

    fn finish_run(&self, run_id: i64) -> Result<HarvestReport> {
        {
            let mut storage = self
                .storage
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            storage.complete_run(run_id)?;
        }

        let report = self.metrics.snapshot();
        tracing::info!(
            "Run {} complete: {} inserted, {} duplicates, {} transport failures",
            run_id,
            report.rows_inserted,
            report.rows_duplicate,
            report.transport_failures
        );
        Ok(report)
    }
}

/// Runs a complete harvest with the given configuration
///
/// Convenience entry point used by the binary.
pub async fn harvest(config: Config, config_hash: String) -> Result<HarvestReport> {
    let harvester = Harvester::new(config, config_hash)?;
    harvester.run().await
}
