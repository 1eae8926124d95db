//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the ria-harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Harvested listings; url uniqueness carries the idempotency guarantee
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT,
    price_usd INTEGER NOT NULL DEFAULT 0,
    odometer_km INTEGER NOT NULL DEFAULT 0,
    seller_username TEXT,
    phone_number TEXT,
    primary_image_url TEXT,
    image_count INTEGER NOT NULL DEFAULT 0,
    plate_number TEXT,
    vin TEXT,
    discovered_at TEXT NOT NULL,
    discovered_run INTEGER NOT NULL REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_listings_url ON listings(url);
CREATE INDEX IF NOT EXISTS idx_listings_run ON listings(discovered_run);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
