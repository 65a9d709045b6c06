//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use gmv_common::filters::FilterState;
use gmv_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use tracing::warn;

const SELECTED_TREE_KEY: &str = "selected_tree";

fn filters_key(tree_id: &str) -> String {
    format!("filters:{}", tree_id)
}

/// Currently selected tree id, if any
pub async fn get_selected_tree(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, SELECTED_TREE_KEY).await
}

pub async fn set_selected_tree(db: &Pool<Sqlite>, tree_id: &str) -> Result<()> {
    set_setting(db, SELECTED_TREE_KEY, tree_id).await
}

/// Stored filter state for a tree
///
/// Returns `None` when nothing is stored. A stored value that no longer
/// parses is logged and treated as absent.
pub async fn get_tree_filters(db: &Pool<Sqlite>, tree_id: &str) -> Result<Option<FilterState>> {
    let Some(query) = get_setting::<String>(db, &filters_key(tree_id)).await? else {
        return Ok(None);
    };

    match FilterState::from_query(&query) {
        Ok(state) => Ok(Some(state)),
        Err(e) => {
            warn!(tree_id, "Discarding unreadable stored filters: {}", e);
            Ok(None)
        }
    }
}

/// Persist filter state for a tree in its normalized query form
pub async fn set_tree_filters(db: &Pool<Sqlite>, tree_id: &str, filters: &FilterState) -> Result<()> {
    set_setting(db, &filters_key(tree_id), filters.to_query()).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
