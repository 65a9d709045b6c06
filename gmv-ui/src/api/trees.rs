//! Tree selector endpoints
//!
//! The tree list comes from the backend; the selection is persisted locally
//! so a reload returns to the same tree.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use chrono::Utc;
use gmv_common::events::GmvEvent;
use gmv_common::models::Tree;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::check_tree_id;
use crate::db::settings;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TreeListResponse {
    pub trees: Vec<Tree>,
    /// Selected tree id, if it still exists in the backend
    pub selected: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectedTree {
    pub tree_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectTreeRequest {
    pub tree_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// GET /api/trees
pub async fn list_trees(State(state): State<AppState>) -> ApiResult<Json<TreeListResponse>> {
    let trees = state.backend.list_trees().await?;

    // A stale selection (tree deleted upstream) is reported as none
    let selected = settings::get_selected_tree(&state.db)
        .await?
        .filter(|id| trees.iter().any(|t| &t.id == id));

    Ok(Json(TreeListResponse { trees, selected }))
}

/// GET /api/trees/selected
pub async fn get_selected_tree(State(state): State<AppState>) -> ApiResult<Json<SelectedTree>> {
    let tree_id = settings::get_selected_tree(&state.db).await?;
    Ok(Json(SelectedTree { tree_id }))
}

/// PUT /api/trees/selected
///
/// The tree must exist in the backend's list.
pub async fn put_selected_tree(
    State(state): State<AppState>,
    request: Result<Json<SelectTreeRequest>, JsonRejection>,
) -> ApiResult<Json<SelectedTree>> {
    let Json(request) = request?;
    let tree_id = request.tree_id.trim().to_string();
    check_tree_id(&tree_id)?;

    let trees = state.backend.list_trees().await?;
    if !trees.iter().any(|t| t.id == tree_id) {
        return Err(ApiError::NotFound(format!("tree {}", tree_id)));
    }

    settings::set_selected_tree(&state.db, &tree_id).await?;
    info!(tree_id = %tree_id, "Tree selected");

    state.events.emit_lossy(GmvEvent::TreeSelected {
        tree_id: tree_id.clone(),
        timestamp: Utc::now(),
    });

    Ok(Json(SelectedTree {
        tree_id: Some(tree_id),
    }))
}

/// POST /api/trees/upload?filename=family.ged
///
/// The request body is the raw file; it is forwarded as multipart `file`.
pub async fn upload_tree(
    State(state): State<AppState>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<Tree>> {
    let Query(query) = query?;
    let body = body?;
    let filename = query
        .filename
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::Validation("filename is required".to_string()))?;

    if body.is_empty() {
        return Err(ApiError::Validation("uploaded file is empty".to_string()));
    }

    info!(filename = %filename, bytes = body.len(), "Uploading tree");
    let tree = state.backend.upload_tree(&filename, body.to_vec()).await?;
    info!(tree_id = %tree.id, "Tree uploaded");

    Ok(Json(tree))
}
