//! Shared fixtures for gmv-ui integration tests
//!
//! Starts an in-process fake of the genealogy backend on 127.0.0.1:0 and
//! builds a gmv-ui router pointed at it, backed by in-memory SQLite.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, RawQuery, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use gmv_common::config::{CliOverrides, Settings};
use gmv_common::models::{
    AnalyticsSnapshot, EventType, GeocodeFix, GeocodeHit, GeocodeStats, MovementEvent, Person,
    PrecomputedSegment, Tree, UnresolvedLocation,
};
use gmv_ui::client::BackendClient;
use gmv_ui::{build_router, AppState};
use serde::Deserialize;
use serde_json::Value;

/// Mutable data served by the fake backend
#[derive(Default)]
pub struct FakeData {
    pub trees: Vec<Tree>,
    pub people: Vec<Person>,
    pub events: Vec<MovementEvent>,
    pub segments: Vec<PrecomputedSegment>,
    pub unresolved: Vec<UnresolvedLocation>,
    pub fixes: Vec<GeocodeFix>,
    pub lookups: HashMap<String, GeocodeHit>,
    /// Delay before answering movement requests
    pub movement_delay: Option<Duration>,
    /// Answer movement requests with 500
    pub fail_movements: bool,
    pub movement_queries: Vec<String>,
}

pub type SharedData = Arc<Mutex<FakeData>>;

pub fn event(
    person: &str,
    kind: EventType,
    date: &str,
    location: &str,
    coord: Option<(f64, f64)>,
) -> MovementEvent {
    MovementEvent {
        person_id: person.to_string(),
        person_name: Some(format!("Person {}", person)),
        event_type: kind,
        date: Some(date.to_string()),
        year: None,
        location: Some(location.to_string()),
        lat: coord.map(|c| c.0),
        lng: coord.map(|c| c.1),
        confidence: Some(0.9),
        source: Some("census".to_string()),
    }
}

pub const CORK: (f64, f64) = (51.8985, -8.4756);
pub const BOSTON: (f64, f64) = (42.3601, -71.0589);
pub const CHICAGO: (f64, f64) = (41.8781, -87.6298);
pub const DUBLIN: (f64, f64) = (53.3498, -6.2603);

/// Two people, one tree, two unresolved locations
pub fn sample_data() -> FakeData {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    FakeData {
        trees: vec![
            Tree { id: "t1".into(), name: "Murphy family".into(), created_at: created },
            Tree { id: "t2".into(), name: "Kelly family".into(), created_at: created },
        ],
        people: vec![
            Person { id: "p1".into(), name: "Mary Murphy".into(), birth_year: Some(1840), occupation: None },
            Person { id: "p2".into(), name: "John Kelly".into(), birth_year: Some(1838), occupation: None },
        ],
        events: vec![
            event("p1", EventType::Birth, "ABT 1840", "Cork, Ireland", Some(CORK)),
            event("p1", EventType::Migration, "1862", "Boston", Some(BOSTON)),
            event("p1", EventType::Residence, "1880", "Chicago", Some(CHICAGO)),
            event("p2", EventType::Birth, "1838", "Dublin", Some(DUBLIN)),
            event("p2", EventType::Residence, "1866", "Boston", Some(BOSTON)),
            event("p2", EventType::Death, "1901", "Chicago", Some(CHICAGO)),
        ],
        segments: Vec::new(),
        unresolved: vec![
            UnresolvedLocation {
                raw: "Atlantis".into(),
                normalized: Some("atlantis".into()),
                confidence: Some(0.1),
                event_count: 3,
                last_seen: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            },
            UnresolvedLocation {
                raw: "Ballyhooly".into(),
                normalized: None,
                confidence: None,
                event_count: 7,
                last_seen: Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
            },
        ],
        ..Default::default()
    }
}

#[derive(Deserialize)]
struct LookupQuery {
    q: String,
}

async fn trees(State(data): State<SharedData>) -> Json<Vec<Tree>> {
    Json(data.lock().unwrap().trees.clone())
}

async fn upload(State(data): State<SharedData>, body: Bytes) -> Response {
    if body.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let tree = Tree {
        id: "uploaded".into(),
        name: "Uploaded tree".into(),
        created_at: Utc::now(),
    };
    data.lock().unwrap().trees.push(tree.clone());
    Json(tree).into_response()
}

/// Ignores `q`: returns everyone
async fn people(State(data): State<SharedData>) -> Json<Vec<Person>> {
    Json(data.lock().unwrap().people.clone())
}

async fn person_events(
    State(data): State<SharedData>,
    Path((_tree, person)): Path<(String, String)>,
) -> Json<Vec<MovementEvent>> {
    let events = data.lock().unwrap().events.iter().filter(|e| e.person_id == person).cloned().collect();
    Json(events)
}

async fn movements(
    State(data): State<SharedData>,
    Path(tree): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let (delay, fail) = {
        let mut d = data.lock().unwrap();
        d.movement_queries.push(query.unwrap_or_default());
        (d.movement_delay, d.fail_movements)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response();
    }
    if tree != "t1" {
        return (StatusCode::NOT_FOUND, "no such tree").into_response();
    }
    Json(data.lock().unwrap().events.clone()).into_response()
}

async fn segments(State(data): State<SharedData>) -> Json<Vec<PrecomputedSegment>> {
    Json(data.lock().unwrap().segments.clone())
}

async fn analytics(State(data): State<SharedData>) -> Json<AnalyticsSnapshot> {
    let d = data.lock().unwrap();
    Json(AnalyticsSnapshot {
        people: d.people.len() as i64,
        events: d.events.len() as i64,
        places: 4,
        earliest_year: Some(1838),
        latest_year: Some(1901),
        ..Default::default()
    })
}

async fn stats(State(data): State<SharedData>) -> Json<GeocodeStats> {
    let d = data.lock().unwrap();
    Json(GeocodeStats {
        total: 10,
        resolved: 10 - d.unresolved.len() as i64,
        unresolved: d.unresolved.len() as i64,
        manual: d.fixes.len() as i64,
    })
}

async fn unresolved(State(data): State<SharedData>) -> Json<Vec<UnresolvedLocation>> {
    Json(data.lock().unwrap().unresolved.clone())
}

async fn fix(State(data): State<SharedData>, Json(fix): Json<GeocodeFix>) -> StatusCode {
    let mut d = data.lock().unwrap();
    d.unresolved.retain(|row| row.raw != fix.raw);
    d.fixes.push(fix);
    StatusCode::NO_CONTENT
}

async fn lookup(State(data): State<SharedData>, Query(query): Query<LookupQuery>) -> Response {
    match data.lock().unwrap().lookups.get(&query.q) {
        Some(hit) => Json(*hit).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the fake backend; returns its API base URL
pub async fn spawn_backend(data: SharedData) -> String {
    let app = Router::new()
        .route("/api/trees", get(trees))
        .route("/api/trees/upload", post(upload))
        .route("/api/trees/:tree/people", get(people))
        .route("/api/trees/:tree/people/:person/events", get(person_events))
        .route("/api/trees/:tree/movements", get(movements))
        .route("/api/trees/:tree/movements/segments", get(segments))
        .route("/api/trees/:tree/analytics", get(analytics))
        .route("/api/geocode/stats", get(stats))
        .route("/api/geocode/unresolved", get(unresolved))
        .route("/api/geocode/fix", post(fix))
        .route("/api/geocode/lookup", get(lookup))
        .with_state(data);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api", addr)
}

/// gmv-ui state against a given backend URL
pub async fn app_state(base_url: &str) -> AppState {
    let db = gmv_ui::db::connect_in_memory().await.unwrap();
    let settings = Settings::resolve(
        CliOverrides {
            api_base_url: Some(base_url.to_string()),
            ..Default::default()
        },
        None,
    );
    let backend = BackendClient::new(base_url, None, Duration::from_secs(5)).unwrap();
    AppState::new(db, backend, settings)
}

/// Fake backend seeded with [`sample_data`], plus a gmv-ui app against it
pub async fn setup() -> (Router, AppState, SharedData) {
    let data = Arc::new(Mutex::new(sample_data()));
    let base_url = spawn_backend(data.clone()).await;
    let state = app_state(&base_url).await;
    (build_router(state.clone()), state, data)
}

/// Base URL where nothing is listening
pub async fn dead_backend_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn text_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Segment features of a movements response
pub fn segment_features(body: &Value) -> Vec<Value> {
    body["features"]["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["properties"]["kind"] == "segment")
        .cloned()
        .collect()
}

/// Point features of a movements response
pub fn point_features(body: &Value) -> Vec<Value> {
    body["features"]["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["properties"]["kind"] == "point")
        .cloned()
        .collect()
}
