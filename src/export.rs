//! Full-database SQL dumps
//!
//! Dumps are produced with the `sqlite3` command-line shell rather than by
//! walking the schema ourselves, so the output is a faithful `.dump` that can
//! be replayed into a fresh database.

use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::{HarvestError, Result};

/// Writes a timestamped SQL dump of the database into the dumps directory
///
/// # Arguments
///
/// * `db_path` - Path to the SQLite database file
/// * `dumps_dir` - Directory that receives the dump; created if missing
///
/// # Returns
///
/// The path of the dump file that was written
pub async fn dump_database(db_path: &Path, dumps_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dumps_dir).await?;

    let filename = format!(
        "listings_backup_{}.sql",
        Local::now().format("%d%m%Y_%H%M%S")
    );
    let dump_path = dumps_dir.join(filename);

    let output = Command::new("sqlite3")
        .arg(db_path)
        .arg(".dump")
        .output()
        .await
        .map_err(|e| HarvestError::Export(format!("could not launch sqlite3: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HarvestError::Export(format!(
            "sqlite3 exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    tokio::fs::write(&dump_path, &output.stdout).await?;
    tracing::info!("Wrote database dump to {}", dump_path.display());

    Ok(dump_path)
}
