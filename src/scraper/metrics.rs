//! Per-run failure and progress counters
//!
//! Every unit-level failure in the pipeline is absorbed locally, so the run
//! itself carries no error signal. These counters make the degradation
//! visible: each failure kind is counted where it is absorbed and summarized
//! at the end of the run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters updated from concurrently running tasks
#[derive(Debug, Default)]
pub struct HarvestMetrics {
    transport_failures: AtomicU64,
    pages_failed: AtomicU64,
    links_collected: AtomicU64,
    listings_extracted: AtomicU64,
    listings_skipped: AtomicU64,
    fields_absent: AtomicU64,
    phones_revealed: AtomicU64,
    phone_tokens_missing: AtomicU64,
    phone_lookups_blocked: AtomicU64,
    phone_lookups_failed: AtomicU64,
    rows_inserted: AtomicU64,
    rows_duplicate: AtomicU64,
    write_errors: AtomicU64,
}

impl HarvestMetrics {
    /// A result page exhausted its retries and contributed no links.
    pub fn record_page_failure(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_links(&self, count: usize) {
        self.links_collected.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// A listing page could not be fetched; the listing produced no record.
    pub fn record_listing_skipped(&self) {
        self.listings_skipped.fetch_add(1, Ordering::Relaxed);
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_extracted(&self) {
        self.listings_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_absent_fields(&self, count: u64) {
        self.fields_absent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_phone_revealed(&self) {
        self.phones_revealed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_phone_token_missing(&self) {
        self.phone_tokens_missing.fetch_add(1, Ordering::Relaxed);
    }

    /// The phone-reveal endpoint answered with something other than JSON.
    pub fn record_phone_blocked(&self) {
        self.phone_lookups_blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// The phone-reveal request itself failed or returned an unusable number.
    pub fn record_phone_failed(&self) {
        self.phone_lookups_failed.fetch_add(1, Ordering::Relaxed);
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_row_inserted(&self) {
        self.rows_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_row_duplicate(&self) {
        self.rows_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> HarvestReport {
        HarvestReport {
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            links_collected: self.links_collected.load(Ordering::Relaxed),
            listings_extracted: self.listings_extracted.load(Ordering::Relaxed),
            listings_skipped: self.listings_skipped.load(Ordering::Relaxed),
            fields_absent: self.fields_absent.load(Ordering::Relaxed),
            phones_revealed: self.phones_revealed.load(Ordering::Relaxed),
            phone_tokens_missing: self.phone_tokens_missing.load(Ordering::Relaxed),
            phone_lookups_blocked: self.phone_lookups_blocked.load(Ordering::Relaxed),
            phone_lookups_failed: self.phone_lookups_failed.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
            rows_duplicate: self.rows_duplicate.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Summary of a harvest run, one count per failure or progress kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub transport_failures: u64,
    pub pages_failed: u64,
    pub links_collected: u64,
    pub listings_extracted: u64,
    pub listings_skipped: u64,
    pub fields_absent: u64,
    pub phones_revealed: u64,
    pub phone_tokens_missing: u64,
    pub phone_lookups_blocked: u64,
    pub phone_lookups_failed: u64,
    pub rows_inserted: u64,
    pub rows_duplicate: u64,
    pub write_errors: u64,
}

impl HarvestReport {
    /// Prints the report to stdout in a formatted manner.
    pub fn print(&self) {
        println!("=== Harvest Report ===\n");

        println!("Collected:");
        println!("  Listing links: {}", self.links_collected);
        println!("  Listings extracted: {}", self.listings_extracted);
        println!("  Rows inserted: {}", self.rows_inserted);
        println!("  Duplicate rows skipped: {}", self.rows_duplicate);
        println!();

        println!("Degradation:");
        println!("  Transport failures: {}", self.transport_failures);
        println!("  Result pages lost: {}", self.pages_failed);
        println!("  Listings skipped: {}", self.listings_skipped);
        println!("  Absent fields: {}", self.fields_absent);
        println!();

        println!("Phone lookups:");
        println!("  Revealed: {}", self.phones_revealed);
        println!("  No token on page: {}", self.phone_tokens_missing);
        println!("  Blocked (non-JSON answer): {}", self.phone_lookups_blocked);
        println!("  Failed: {}", self.phone_lookups_failed);

        if self.write_errors > 0 {
            println!();
            println!("Write errors: {}", self.write_errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_recorded_counts() {
        let metrics = HarvestMetrics::default();
        metrics.record_page_failure();
        metrics.record_listing_skipped();
        metrics.record_listing_skipped();
        metrics.add_links(12);
        metrics.record_phone_blocked();
        metrics.record_row_inserted();
        metrics.record_row_duplicate();

        let report = metrics.snapshot();
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.listings_skipped, 2);
        // Page and listing failures both count as transport failures.
        assert_eq!(report.transport_failures, 3);
        assert_eq!(report.links_collected, 12);
        assert_eq!(report.phone_lookups_blocked, 1);
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(report.rows_duplicate, 1);
    }

    #[test]
    fn test_default_report_is_zeroed() {
        assert_eq!(HarvestMetrics::default().snapshot(), HarvestReport::default());
    }
}
