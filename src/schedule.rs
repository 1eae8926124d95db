//! Daily harvest and dump scheduling
//!
//! Long-running mode: sleep until the next configured wall-clock trigger,
//! run the action, repeat. Trigger times are local times in `HH:MM`; a
//! trigger that already passed today fires tomorrow.

use chrono::{DateTime, Local, NaiveTime};
use std::time::Duration;

use crate::config::Config;
use crate::export::dump_database;
use crate::scraper::harvest;
use crate::{ConfigError, HarvestError, Result};
use std::path::Path;

/// Parses a `HH:MM` wall-clock time.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Next local instant at which a daily `HH:MM` trigger fires
///
/// Returns `None` only when the local calendar cannot represent the instant
/// (end of calendar, or a time skipped by a DST transition).
pub fn next_occurrence(now: DateTime<Local>, at: NaiveTime) -> Option<DateTime<Local>> {
    let mut date = now.date_naive();
    if date.and_time(at) <= now.naive_local() {
        date = date.succ_opt()?;
    }
    date.and_time(at).and_local_timezone(Local).earliest()
}

enum Action {
    Harvest,
    Dump,
}

/// Runs harvests (and optionally dumps) on their daily triggers, forever
///
/// A failed action is logged and the loop continues; only a configuration
/// problem ends scheduling.
pub async fn run_daily(config: Config, config_hash: String) -> Result<()> {
    let schedule = config.schedule.clone().ok_or_else(|| {
        HarvestError::Config(ConfigError::Validation(
            "schedule mode requires a [schedule] section".to_string(),
        ))
    })?;

    let harvest_at = parse_time_of_day(&schedule.harvest_at).ok_or_else(|| {
        HarvestError::Config(ConfigError::Validation(format!(
            "invalid harvest-at time: {}",
            schedule.harvest_at
        )))
    })?;

    let dump_at = match &schedule.dump_at {
        Some(value) => Some(parse_time_of_day(value).ok_or_else(|| {
            HarvestError::Config(ConfigError::Validation(format!(
                "invalid dump-at time: {}",
                value
            )))
        })?),
        None => None,
    };

    loop {
        let now = Local::now();
        let next_harvest = next_occurrence(now, harvest_at);
        let next_dump = dump_at.and_then(|at| next_occurrence(now, at));

        let (next, action) = match (next_harvest, next_dump) {
            (Some(h), Some(d)) if d < h => (d, Action::Dump),
            (Some(h), _) => (h, Action::Harvest),
            (None, Some(d)) => (d, Action::Dump),
            (None, None) => {
                return Err(HarvestError::Config(ConfigError::Validation(
                    "no representable next trigger".to_string(),
                )))
            }
        };

        let wait = (next - Local::now())
            .to_std()
            .unwrap_or(Duration::from_secs(0));
        tracing::info!("Next trigger at {}; sleeping {:?}", next, wait);
        tokio::time::sleep(wait).await;

        match action {
            Action::Harvest => match harvest(config.clone(), config_hash.clone()).await {
                Ok(report) => report.print(),
                Err(e) => tracing::error!("Scheduled harvest failed: {}", e),
            },
            Action::Dump => {
                let db_path = Path::new(&config.database.path);
                let dumps_dir = Path::new(&config.database.dumps_dir);
                if let Err(e) = dump_database(db_path, dumps_dir).await {
                    tracing::error!("Scheduled dump failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(
            parse_time_of_day("12:00"),
            NaiveTime::from_hms_opt(12, 0, 0)
        );
        assert_eq!(
            parse_time_of_day("00:05"),
            NaiveTime::from_hms_opt(0, 5, 0)
        );
        assert_eq!(parse_time_of_day("24:00"), None);
        assert_eq!(parse_time_of_day("noon"), None);
        assert_eq!(parse_time_of_day(""), None);
    }

    #[test]
    fn test_next_occurrence_later_today() {
        let now = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 3, 5)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap();
        let at = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        let next = next_occurrence(now, at).unwrap();
        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!(next.time(), at);
    }

    #[test]
    fn test_next_occurrence_rolls_to_tomorrow() {
        let now = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 3, 5)
                    .unwrap()
                    .and_hms_opt(13, 0, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap();
        let at = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        let next = next_occurrence(now, at).unwrap();
        assert_eq!(
            next.date_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
        );
    }

    #[test]
    fn test_next_occurrence_exact_trigger_time_rolls_over() {
        let at = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let now = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_time(at),
            )
            .earliest()
            .unwrap();

        let next = next_occurrence(now, at).unwrap();
        assert_eq!(
            next.date_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
        );
    }
}
