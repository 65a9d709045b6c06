//! People search and per-person events

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use gmv_common::models::{MovementEvent, Person};
use serde::Deserialize;

use super::check_tree_id;
use crate::error::ApiResult;
use crate::pagination::{paginate, Page};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PeopleQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// GET /api/trees/:tree_id/people?q=&page=
///
/// The backend search is forwarded, then narrowed here to a case-insensitive
/// name match since not every backend honors `q`.
pub async fn list_people(
    State(state): State<AppState>,
    Path(tree_id): Path<String>,
    query: Result<Query<PeopleQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Person>>> {
    let Query(query) = query?;
    check_tree_id(&tree_id)?;

    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let mut people = state.backend.list_people(&tree_id, needle.as_deref()).await?;
    if let Some(needle) = &needle {
        people.retain(|p| p.name.to_lowercase().contains(needle.as_str()));
    }

    Ok(Json(paginate(people, query.page)))
}

/// GET /api/trees/:tree_id/people/:person_id/events
pub async fn get_person_events(
    State(state): State<AppState>,
    Path((tree_id, person_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<MovementEvent>>> {
    check_tree_id(&tree_id)?;
    let events = state.backend.person_events(&tree_id, &person_id).await?;
    Ok(Json(events))
}
