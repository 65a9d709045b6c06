//! gmv-ui library - genealogy migration visualizer front end
//!
//! Serves the single-page map UI and the JSON API behind it. Genealogy data
//! comes from the remote backend; this process holds the filter state, the
//! client-side geocode cache and the movement pipeline.

use std::sync::Arc;

use axum::Router;
use gmv_common::config::Settings;
use gmv_common::events::EventBus;
use sqlx::SqlitePool;

pub mod api;
pub mod client;
pub mod db;
pub mod error;
pub mod movement;
pub mod pagination;
pub mod requests;

use client::BackendClient;
use movement::GeocodeCache;
use requests::ViewRequests;

/// Capacity of the SSE event bus
const EVENT_BUS_CAPACITY: usize = 256;

/// Largest accepted tree upload
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Local state database (selected tree, stored filters)
    pub db: SqlitePool,
    /// Remote genealogy API
    pub backend: Arc<BackendClient>,
    pub geocache: Arc<GeocodeCache>,
    /// Cancel-and-replace registry for per-view requests
    pub requests: Arc<ViewRequests>,
    pub events: EventBus,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, backend: BackendClient, settings: Settings) -> Self {
        let events = EventBus::new(EVENT_BUS_CAPACITY);
        Self {
            db,
            backend: Arc::new(backend),
            geocache: Arc::new(GeocodeCache::new(events.clone())),
            requests: Arc::new(ViewRequests::new()),
            events,
            settings: Arc::new(settings),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post};
    use tower_http::catch_panic::CatchPanicLayer;
    use tower_http::trace::TraceLayer;

    let api_routes = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/config", get(api::get_client_config))
        .route("/api/events", get(api::event_stream))
        // Trees
        .route("/api/trees", get(api::list_trees))
        .route(
            "/api/trees/selected",
            get(api::get_selected_tree).put(api::put_selected_tree),
        )
        .route(
            "/api/trees/upload",
            post(api::upload_tree).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Per-tree views
        .route(
            "/api/trees/:tree_id/filters",
            get(api::get_filters).put(api::put_filters),
        )
        .route("/api/trees/:tree_id/movements", get(api::get_movements))
        .route("/api/trees/:tree_id/timeline", get(api::get_timeline))
        .route("/api/trees/:tree_id/people", get(api::list_people))
        .route(
            "/api/trees/:tree_id/people/:person_id/events",
            get(api::get_person_events),
        )
        .route("/api/trees/:tree_id/analytics", get(api::get_analytics))
        // Geocode admin
        .route("/api/geocode/stats", get(api::get_geocode_stats))
        .route("/api/geocode/unresolved", get(api::list_unresolved))
        .route("/api/geocode/fix", post(api::submit_fix))
        .route("/api/geocode/lookups/retry", post(api::retry_lookups));

    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .merge(api::health_routes());

    Router::new()
        .merge(api_routes)
        .merge(public)
        .with_state(state)
        .layer(CatchPanicLayer::custom(api::handle_panic))
        .layer(TraceLayer::new_for_http())
}
