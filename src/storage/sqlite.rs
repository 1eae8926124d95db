//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::listing::Listing;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{ListingRecord, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn row_to_listing_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListingRecord> {
    let discovered_at: String = row.get(11)?;
    let discovered_at = DateTime::parse_from_rfc3339(&discovered_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ListingRecord {
        id: row.get(0)?,
        listing: Listing {
            url: row.get(1)?,
            title: row.get(2)?,
            price_usd: row.get(3)?,
            odometer_km: row.get(4)?,
            seller_username: row.get(5)?,
            phone_number: row.get(6)?,
            primary_image_url: row.get(7)?,
            image_count: row.get(8)?,
            plate_number: row.get(9)?,
            vin: row.get(10)?,
            discovered_at,
        },
        discovered_run: row.get(12)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })
            .optional()?;

        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Listing Management =====

    fn insert_listing(&mut self, listing: &Listing, run_id: i64) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO listings
             (url, title, price_usd, odometer_km, seller_username, phone_number,
              primary_image_url, image_count, plate_number, vin, discovered_at, discovered_run)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(url) DO NOTHING",
            params![
                listing.url,
                listing.title,
                listing.price_usd,
                listing.odometer_km,
                listing.seller_username,
                listing.phone_number,
                listing.primary_image_url,
                listing.image_count,
                listing.plate_number,
                listing.vin,
                listing.discovered_at.to_rfc3339(),
                run_id,
            ],
        )?;

        Ok(inserted > 0)
    }

    fn get_listing_by_url(&self, url: &str) -> StorageResult<Option<ListingRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, title, price_usd, odometer_km, seller_username, phone_number,
             primary_image_url, image_count, plate_number, vin, discovered_at, discovered_run
             FROM listings WHERE url = ?1",
        )?;

        let record = stmt
            .query_row(params![url], row_to_listing_record)
            .optional()?;

        Ok(record)
    }

    // ===== Statistics =====

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_listings_for_run(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE discovered_run = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_listings_with_phone(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE phone_number IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing(url: &str) -> Listing {
        Listing {
            url: url.to_string(),
            title: Some("Kia Sportage 2023".to_string()),
            price_usd: 12500,
            odometer_km: 125_000,
            seller_username: Some("Serhii".to_string()),
            phone_number: Some("+380671234567".to_string()),
            primary_image_url: Some("https://cdn.example.com/main.webp".to_string()),
            image_count: 3,
            plate_number: Some("AA1234BB".to_string()),
            vin: Some("KNAPX81GBPK123456".to_string()),
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();
        assert!(run_id > 0);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, run_id);
        assert_eq!(latest.status, RunStatus::Running);
        assert!(latest.finished_at.is_none());

        storage.complete_run(run_id).unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.status, RunStatus::Completed);
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_insert_and_read_back_listing() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();
        let listing = sample_listing("https://auto.example.com/auto_kia_1.html");

        let inserted = storage.insert_listing(&listing, run_id).unwrap();
        assert!(inserted);

        let record = storage
            .get_listing_by_url(&listing.url)
            .unwrap()
            .expect("listing should exist");
        assert_eq!(record.listing.url, listing.url);
        assert_eq!(record.listing.price_usd, 12500);
        assert_eq!(record.listing.odometer_km, 125_000);
        assert_eq!(record.listing.phone_number, listing.phone_number);
        assert_eq!(record.listing.discovered_at, listing.discovered_at);
        assert_eq!(record.discovered_run, run_id);
    }

    #[test]
    fn test_duplicate_url_keeps_first_record() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();
        let url = "https://auto.example.com/auto_kia_1.html";

        let first = sample_listing(url);
        assert!(storage.insert_listing(&first, run_id).unwrap());

        let mut second = sample_listing(url);
        second.price_usd = 999;
        assert!(!storage.insert_listing(&second, run_id).unwrap());

        // First record wins
        let record = storage.get_listing_by_url(url).unwrap().unwrap();
        assert_eq!(record.listing.price_usd, 12500);
        assert_eq!(storage.count_listings().unwrap(), 1);
    }

    #[test]
    fn test_listing_with_absent_fields_roundtrips() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();

        let listing = Listing {
            url: "https://auto.example.com/auto_bare_2.html".to_string(),
            title: None,
            price_usd: 0,
            odometer_km: 0,
            seller_username: None,
            phone_number: None,
            primary_image_url: None,
            image_count: 0,
            plate_number: None,
            vin: None,
            discovered_at: Utc::now(),
        };
        assert!(storage.insert_listing(&listing, run_id).unwrap());

        let record = storage.get_listing_by_url(&listing.url).unwrap().unwrap();
        assert!(record.listing.title.is_none());
        assert!(record.listing.phone_number.is_none());
        assert_eq!(record.listing.price_usd, 0);
    }

    #[test]
    fn test_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_a = storage.create_run("hash_a").unwrap();
        let run_b = storage.create_run("hash_b").unwrap();

        storage
            .insert_listing(&sample_listing("https://auto.example.com/1.html"), run_a)
            .unwrap();
        storage
            .insert_listing(&sample_listing("https://auto.example.com/2.html"), run_a)
            .unwrap();

        let mut no_phone = sample_listing("https://auto.example.com/3.html");
        no_phone.phone_number = None;
        storage.insert_listing(&no_phone, run_b).unwrap();

        assert_eq!(storage.count_listings().unwrap(), 3);
        assert_eq!(storage.count_listings_for_run(run_a).unwrap(), 2);
        assert_eq!(storage.count_listings_for_run(run_b).unwrap(), 1);
        assert_eq!(storage.count_listings_with_phone().unwrap(), 2);
    }
}
