//! ria-harvest main entry point
//!
//! This is the command-line interface for the ria-harvest listing harvester.

use clap::Parser;
use std::path::PathBuf;
use ria_harvest::config::load_config_with_hash;
use ria_harvest::scraper::harvest;
use tracing_subscriber::EnvFilter;

/// ria-harvest: a concurrent vehicle-listing harvester
///
/// ria-harvest crawls a paginated vehicle catalog, extracts structured fields
/// (including seller phone numbers behind a protected endpoint) from every
/// listing, and stores new listings idempotently in SQLite.
#[derive(Parser, Debug)]
#[command(name = "ria-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent vehicle-listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run forever, harvesting (and dumping) on the configured daily triggers
    #[arg(long, conflicts_with_all = ["stats", "dump"])]
    schedule: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["schedule", "dump"])]
    stats: bool,

    /// Write a SQL dump of the database and exit
    #[arg(long, conflicts_with_all = ["schedule", "stats"])]
    dump: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.stats {
        handle_stats(&config)?;
    } else if cli.dump {
        handle_dump(&config).await?;
    } else if cli.schedule {
        ria_harvest::schedule::run_daily(config, config_hash).await?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ria_harvest=info,warn"),
            1 => EnvFilter::new("ria_harvest=debug,info"),
            2 => EnvFilter::new("ria_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &ria_harvest::config::Config) -> Result<(), Box<dyn std::error::Error>> {
    use std::path::Path;
    use ria_harvest::storage::{SqliteStorage, Storage};

    println!("Database: {}\n", config.database.path);

    let storage = SqliteStorage::new(Path::new(&config.database.path))?;

    println!("Listings:");
    println!("  Total: {}", storage.count_listings()?);
    println!("  With phone number: {}", storage.count_listings_with_phone()?);

    match storage.get_latest_run()? {
        Some(run) => {
            println!("\nLatest run:");
            println!("  Id: {}", run.id);
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(still running)")
            );
            println!("  Status: {}", run.status.to_db_string());
            println!(
                "  New listings: {}",
                storage.count_listings_for_run(run.id)?
            );
        }
        None => println!("\nNo runs recorded yet"),
    }

    Ok(())
}

/// Handles the --dump mode: writes a SQL dump of the database
async fn handle_dump(
    config: &ria_harvest::config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::path::Path;

    let dump_path = ria_harvest::export::dump_database(
        Path::new(&config.database.path),
        Path::new(&config.database.dumps_dir),
    )
    .await?;

    println!("✓ Dump written to: {}", dump_path.display());
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: ria_harvest::config::Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Harvesting {} search(es) with up to {} concurrent requests",
        config.search.len(),
        config.harvester.max_concurrent_requests
    );

    match harvest(config, config_hash).await {
        Ok(report) => {
            report.print();
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
