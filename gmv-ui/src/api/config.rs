//! Page configuration endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::pagination::PAGE_SIZE;
use crate::AppState;

/// Settings the page needs before it can draw anything
#[derive(Debug, Serialize)]
pub struct ClientConfig {
    /// Basemap tile URL template (`{z}/{x}/{y}`)
    pub tile_url: String,
    pub page_size: i64,
    pub low_confidence_threshold: f64,
    pub max_km_per_year: f64,
}

/// GET /api/config
pub async fn get_client_config(State(state): State<AppState>) -> Json<ClientConfig> {
    Json(ClientConfig {
        tile_url: state.settings.tile_url.clone(),
        page_size: PAGE_SIZE,
        low_confidence_threshold: state.settings.quality.low_confidence_threshold,
        max_km_per_year: state.settings.quality.max_km_per_year,
    })
}
