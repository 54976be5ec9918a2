//! SQLite pool construction.
//!
//! One database file holds every partition. WAL keeps readers unblocked
//! during writes; the optional `max_page_count` pragma turns the
//! configured storage budget into a hard quota the engine enforces.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// SQLite's default page size; `max_size_bytes` is converted to pages.
const PAGE_SIZE: u64 = 4096;

pub async fn connect(path: &Path, max_size_bytes: Option<u64>) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
    }

    let mut options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    // Pragmas are per-connection, so the quota is attached to the
    // connect options rather than executed once against the pool.
    if let Some(bytes) = max_size_bytes {
        let pages = bytes.div_ceil(PAGE_SIZE).max(1);
        options = options.pragma("max_page_count", pages.to_string());
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
