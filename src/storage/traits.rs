//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::listing::Listing;
use crate::storage::{ListingRecord, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Listing Management =====

    /// Inserts a listing unless its URL is already present
    ///
    /// The first record for a URL wins; a later insert for the same URL is a
    /// no-op, never an overwrite.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A new row was inserted
    /// * `Ok(false)` - The URL already existed and the row was left untouched
    fn insert_listing(&mut self, listing: &Listing, run_id: i64) -> StorageResult<bool>;

    /// Gets a listing by URL
    fn get_listing_by_url(&self, url: &str) -> StorageResult<Option<ListingRecord>>;

    // ===== Statistics =====

    /// Gets total listing count
    fn count_listings(&self) -> StorageResult<u64>;

    /// Counts listings first discovered by a given run
    fn count_listings_for_run(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts listings that carry a revealed phone number
    fn count_listings_with_phone(&self) -> StorageResult<u64>;
}
