//! Local state database
//!
//! A single `settings(key, value)` table in `<root>/gmv.db` holds the
//! selected tree and the per-tree filter state. Nothing else is persisted
//! locally; every genealogy record lives in the remote backend.

use gmv_common::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub mod settings;

const CREATE_SETTINGS_TABLE: &str = "CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_SETTINGS_TABLE)
        .execute(pool)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

/// Open (creating if needed) the local state database
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // mode=rwc: create the file on first run
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url).map_err(Error::Database)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(Error::Database)?;

    init_schema(&pool).await?;
    info!("Local state database ready: {}", db_path.display());
    Ok(pool)
}

/// In-memory database for tests
///
/// Pinned to one connection that never expires, since every new connection
/// to `:memory:` would see an empty database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .map_err(Error::Database)?;

    init_schema(&pool).await?;
    Ok(pool)
}
