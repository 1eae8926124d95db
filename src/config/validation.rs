//! Configuration validation
//!
//! Checks performed after TOML parsing, before any network or database work:
//! harvester limits are sane, every search URL is a usable base for pagination,
//! and schedule times parse as `HH:MM`.

use crate::config::types::Config;
use crate::schedule::parse_time_of_day;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvester(config)?;
    validate_search(config)?;
    validate_schedule(config)?;
    Ok(())
}

fn validate_harvester(config: &Config) -> Result<(), ConfigError> {
    if config.harvester.max_concurrent_requests == 0 {
        return Err(ConfigError::Validation(
            "max-concurrent-requests must be at least 1".to_string(),
        ));
    }

    if config.harvester.page_size == 0 {
        return Err(ConfigError::Validation(
            "page-size must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_search(config: &Config) -> Result<(), ConfigError> {
    if config.search.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[search]] entry is required".to_string(),
        ));
    }

    for entry in &config.search {
        let parsed = Url::parse(&entry.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", entry.url, e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: only http and https URLs are supported",
                entry.url
            )));
        }

        // Pagination parameters are appended with '&', so the base URL must
        // already carry a query string.
        if parsed.query().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: search URL must include query-string filters",
                entry.url
            )));
        }
    }

    Ok(())
}

fn validate_schedule(config: &Config) -> Result<(), ConfigError> {
    let Some(schedule) = &config.schedule else {
        return Ok(());
    };

    if parse_time_of_day(&schedule.harvest_at).is_none() {
        return Err(ConfigError::Validation(format!(
            "invalid harvest-at time {:?}, expected HH:MM",
            schedule.harvest_at
        )));
    }

    if let Some(dump_at) = &schedule.dump_at {
        if parse_time_of_day(dump_at).is_none() {
            return Err(ConfigError::Validation(format!(
                "invalid dump-at time {:?}, expected HH:MM",
                dump_at
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DatabaseConfig, HarvesterConfig, ScheduleConfig, SearchEntry};

    fn valid_config() -> Config {
        Config {
            harvester: HarvesterConfig {
                max_concurrent_requests: 30,
                max_retries: 5,
                retry_delay_ms: 1000,
                page_size: 100,
            },
            database: DatabaseConfig {
                path: "./listings.db".to_string(),
                dumps_dir: "./dumps".to_string(),
            },
            schedule: None,
            search: vec![SearchEntry {
                url: "https://auto.example.com/search/?indexName=auto".to_string(),
            }],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.harvester.max_concurrent_requests = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config = valid_config();
        config.harvester.page_size = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_search_rejected() {
        let mut config = valid_config();
        config.search.clear();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_search_url_rejected() {
        let mut config = valid_config();
        config.search[0].url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let mut config = valid_config();
        config.search[0].url = "ftp://auto.example.com/search/?a=1".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_search_url_without_query_rejected() {
        let mut config = valid_config();
        config.search[0].url = "https://auto.example.com/search/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_schedule_times_validated() {
        let mut config = valid_config();
        config.schedule = Some(ScheduleConfig {
            harvest_at: "12:00".to_string(),
            dump_at: Some("23:30".to_string()),
        });
        assert!(validate(&config).is_ok());

        config.schedule = Some(ScheduleConfig {
            harvest_at: "25:99".to_string(),
            dump_at: None,
        });
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
