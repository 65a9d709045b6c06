//! Timeline endpoint: per-person ordered events for the side panel

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use gmv_common::filters::FilterState;
use serde::Serialize;

use super::check_tree_id;
use super::movements::MovementOptions;
use crate::error::{ApiError, ApiResult};
use crate::movement::transform::PersonTrack;
use crate::movement::group_by_person;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub tree_id: String,
    pub filters: String,
    pub tracks: Vec<PersonTrack>,
}

/// GET /api/trees/:tree_id/timeline?<filter query>&view=
pub async fn get_timeline(
    State(state): State<AppState>,
    Path(tree_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<TimelineResponse>> {
    check_tree_id(&tree_id)?;

    let query = query.unwrap_or_default();
    let filters = FilterState::from_query(&query)?;
    let view = MovementOptions::from_query(&query)?.view;

    let events = state
        .requests
        .run(view.as_deref(), async {
            Ok::<_, ApiError>(state.backend.movements(&tree_id, &filters).await?)
        })
        .await?;

    let admitted: Vec<_> = events.into_iter().filter(|e| filters.admits(e)).collect();
    let tracks = group_by_person(admitted, &state.geocache.snapshot());

    Ok(Json(TimelineResponse {
        tree_id,
        filters: filters.to_query(),
        tracks,
    }))
}
