use serde::Deserialize;

/// Main configuration structure for ria-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvester: HarvesterConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
    #[serde(default)]
    pub search: Vec<SearchEntry>,
}

/// Harvester behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Maximum number of concurrently in-flight network requests
    #[serde(
        rename = "max-concurrent-requests",
        default = "default_max_concurrent_requests"
    )]
    pub max_concurrent_requests: u32,

    /// Additional attempts after a failed fetch before giving up on a unit
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between fetch attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Number of results requested per catalog page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,

    /// Directory that receives full-database SQL dumps
    #[serde(rename = "dumps-dir", default = "default_dumps_dir")]
    pub dumps_dir: String,
}

/// Daily trigger configuration; optional, only needed for `--schedule` mode
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily harvest, `HH:MM`
    #[serde(rename = "harvest-at")]
    pub harvest_at: String,

    /// Local wall-clock time of the daily database dump, `HH:MM`
    #[serde(rename = "dump-at")]
    pub dump_at: Option<String>,
}

/// One base search URL to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEntry {
    /// Base search URL with query-string filters already applied
    pub url: String,
}

fn default_max_concurrent_requests() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_page_size() -> u32 {
    100
}

fn default_dumps_dir() -> String {
    "./dumps".to_string()
}
