//! HTTP API handlers for gmv-ui

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::client::is_valid_id;
use crate::error::{ApiError, ApiResult};

pub mod analytics;
pub mod buildinfo;
pub mod config;
pub mod filters;
pub mod geocode;
pub mod health;
pub mod movements;
pub mod people;
pub mod sse;
pub mod timeline;
pub mod trees;
pub mod ui;

pub use analytics::get_analytics;
pub use buildinfo::get_build_info;
pub use config::get_client_config;
pub use filters::{get_filters, put_filters};
pub use geocode::{get_geocode_stats, list_unresolved, retry_lookups, submit_fix};
pub use health::health_routes;
pub use movements::get_movements;
pub use people::{get_person_events, list_people};
pub use sse::event_stream;
pub use timeline::get_timeline;
pub use trees::{get_selected_tree, list_trees, put_selected_tree, upload_tree};
pub use ui::{serve_app_js, serve_index};

/// Reject path ids that cannot be forwarded to the backend
pub(crate) fn check_tree_id(tree_id: &str) -> ApiResult<()> {
    if is_valid_id(tree_id) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("Invalid tree id: {}", tree_id)))
    }
}

/// Last-resort response for a panicking handler
///
/// The page shows its full-screen error fallback for `UNCAUGHT_EXCEPTION`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": {
                "code": "UNCAUGHT_EXCEPTION",
                "message": "An unexpected error occurred",
                "retryable": false,
            }
        })),
    )
        .into_response()
}
