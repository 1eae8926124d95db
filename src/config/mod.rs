//! Configuration module for ria-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use ria_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Concurrency: {}", config.harvester.max_concurrent_requests);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, DatabaseConfig, HarvesterConfig, ScheduleConfig, SearchEntry};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
