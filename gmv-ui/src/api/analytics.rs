//! Tree analytics snapshot

use axum::{
    extract::{Path, State},
    Json,
};
use gmv_common::models::AnalyticsSnapshot;

use super::check_tree_id;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/trees/:tree_id/analytics
pub async fn get_analytics(
    State(state): State<AppState>,
    Path(tree_id): Path<String>,
) -> ApiResult<Json<AnalyticsSnapshot>> {
    check_tree_id(&tree_id)?;
    Ok(Json(state.backend.analytics(&tree_id).await?))
}
