//! Per-tree filter state endpoints
//!
//! The stored form is the normalized query string, identical to what the
//! page puts in its URL, so both sides round-trip the same text.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use gmv_common::events::GmvEvent;
use gmv_common::filters::FilterState;
use serde::Serialize;
use tracing::debug;

use super::check_tree_id;
use crate::db::settings;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FiltersResponse {
    pub tree_id: String,
    pub filters: FilterState,
    /// Normalized query string for the page URL
    pub query: String,
    /// Whether the state came from storage (false means defaults)
    pub stored: bool,
}

impl FiltersResponse {
    fn new(tree_id: String, filters: FilterState, stored: bool) -> Self {
        let query = filters.to_query();
        Self {
            tree_id,
            filters,
            query,
            stored,
        }
    }
}

/// GET /api/trees/:tree_id/filters
pub async fn get_filters(
    State(state): State<AppState>,
    Path(tree_id): Path<String>,
) -> ApiResult<Json<FiltersResponse>> {
    check_tree_id(&tree_id)?;

    let response = match settings::get_tree_filters(&state.db, &tree_id).await? {
        Some(filters) => FiltersResponse::new(tree_id, filters, true),
        None => FiltersResponse::new(tree_id, FilterState::default(), false),
    };
    Ok(Json(response))
}

/// PUT /api/trees/:tree_id/filters
///
/// Body is a raw query string (`mode=family&year_min=1800&...`).
pub async fn put_filters(
    State(state): State<AppState>,
    Path(tree_id): Path<String>,
    body: String,
) -> ApiResult<Json<FiltersResponse>> {
    check_tree_id(&tree_id)?;

    let filters = FilterState::from_query(body.trim())?;
    settings::set_tree_filters(&state.db, &tree_id, &filters).await?;

    let response = FiltersResponse::new(tree_id, filters, true);
    debug!(tree_id = %response.tree_id, query = %response.query, "Filters stored");

    state.events.emit_lossy(GmvEvent::FiltersChanged {
        tree_id: response.tree_id.clone(),
        query: response.query.clone(),
        timestamp: Utc::now(),
    });

    Ok(Json(response))
}
