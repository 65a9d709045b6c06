//! Movement map endpoint
//!
//! `GET /api/trees/:tree_id/movements?<filter query>&style=&color=&data=&view=`
//!
//! Fetches events (or backend-precomputed segments), applies the filter,
//! derives segments against the current geocode cache, queues lookups for
//! misses and renders GeoJSON layers. Requests carrying a `view` id replace
//! any in-flight request for the same view.

use std::str::FromStr;

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use gmv_common::filters::{FilterState, ViewMode};
use gmv_common::models::PrecomputedSegment;
use serde::Serialize;
use tracing::debug;

use super::check_tree_id;
use crate::error::{ApiError, ApiResult};
use crate::movement::render::feature_kinds;
use crate::movement::{derive, from_precomputed, render, ColorMode, LineStyle, MapLayers, MovementView, RenderOptions};
use crate::AppState;

/// Where segments come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Raw events, segments derived here
    #[default]
    Raw,
    /// Segments derived by the backend
    Precomputed,
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(DataSource::Raw),
            "precomputed" => Ok(DataSource::Precomputed),
            other => Err(format!("unknown data source: {}", other)),
        }
    }
}

/// Non-filter query parameters of a movement request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementOptions {
    pub render: RenderOptions,
    pub data: DataSource,
    pub view: Option<String>,
}

impl MovementOptions {
    /// Pick the option keys out of the full query string
    ///
    /// Unlike filter values, a bad option is a request error: the page only
    /// ever sends the fixed set of values.
    pub fn from_query(query: &str) -> ApiResult<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.trim_start_matches('?'))
            .map_err(|e| ApiError::Validation(format!("malformed query: {}", e)))?;

        let mut options = MovementOptions::default();
        for (key, value) in pairs {
            match key.as_str() {
                "style" => options.render.style = LineStyle::from_str(&value).map_err(ApiError::Validation)?,
                "color" => options.render.color = ColorMode::from_str(&value).map_err(ApiError::Validation)?,
                "data" => options.data = DataSource::from_str(&value).map_err(ApiError::Validation)?,
                "view" => options.view = Some(value).filter(|v| !v.is_empty()),
                k if FilterState::owns_key(k) => {}
                other => debug!(key = other, "Ignoring unknown movement query key"),
            }
        }
        Ok(options)
    }
}

#[derive(Debug, Serialize)]
pub struct MovementsResponse {
    pub tree_id: String,
    /// Normalized filter query the view was computed for
    pub filters: String,
    pub data: DataSource,
    /// Geocode cache version the segments were derived against
    pub cache_version: u64,
    /// Events (or segments) returned by the backend before filtering
    pub fetched: usize,
    /// Geocode lookups started by this request
    pub lookups_started: usize,
    #[serde(flatten)]
    pub layers: MapLayers,
}

/// Whether a precomputed segment passes the filter
///
/// Both endpoint years must lie in range. Event types, sources and the text
/// query do not apply since the backend does not report them per segment.
fn admits_segment(filters: &FilterState, segment: &PrecomputedSegment) -> bool {
    let in_range = |year: i32| year >= filters.year_min && year <= filters.year_max;
    if !in_range(segment.from_year) || !in_range(segment.to_year) {
        return false;
    }
    filters.selected.is_empty()
        || filters.mode == ViewMode::Family
        || filters.selected.iter().any(|id| id == &segment.person_id)
}

async fn fetch_view(
    state: &AppState,
    tree_id: &str,
    filters: &FilterState,
    data: DataSource,
) -> ApiResult<(MovementView, usize)> {
    match data {
        DataSource::Raw => {
            let events = state.backend.movements(tree_id, filters).await?;
            let fetched = events.len();
            let admitted: Vec<_> = events.into_iter().filter(|e| filters.admits(e)).collect();
            debug!(tree_id, fetched, admitted = admitted.len(), "Movement events filtered");

            let view = derive(admitted, &state.geocache.snapshot(), &state.settings.quality);
            Ok((view, fetched))
        }
        DataSource::Precomputed => {
            let segments = state.backend.precomputed_segments(tree_id, filters).await?;
            let fetched = segments.len();
            let admitted: Vec<_> = segments
                .into_iter()
                .filter(|s| admits_segment(filters, s))
                .collect();

            Ok((from_precomputed(admitted, &state.settings.quality), fetched))
        }
    }
}

/// GET /api/trees/:tree_id/movements
pub async fn get_movements(
    State(state): State<AppState>,
    Path(tree_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<MovementsResponse>> {
    check_tree_id(&tree_id)?;

    let query = query.unwrap_or_default();
    let filters = FilterState::from_query(&query)?;
    let options = MovementOptions::from_query(&query)?;

    let (view, fetched) = state
        .requests
        .run(
            options.view.as_deref(),
            fetch_view(&state, &tree_id, &filters, options.data),
        )
        .await?;

    let lookups_started = state
        .geocache
        .request_lookups(state.backend.clone(), &view.misses);

    let layers = render(&view, options.render, state.geocache.pending_count());
    debug!(tree_id = %tree_id, kinds = ?feature_kinds(&layers), "Rendered movement layers");

    Ok(Json(MovementsResponse {
        tree_id,
        filters: filters.to_query(),
        data: options.data,
        cache_version: state.geocache.version(),
        fetched,
        lookups_started,
        layers,
    }))
}
