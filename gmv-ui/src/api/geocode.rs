//! Geocode admin endpoints
//!
//! Unresolved-location table, manual fixes and stats. A fix is posted to the
//! backend first; only once it is accepted does the local cache learn the
//! coordinate, so a rejected fix never shows up on the map.

use std::cmp::Ordering;
use std::str::FromStr;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use chrono::Utc;
use gmv_common::events::GmvEvent;
use gmv_common::geo::Coordinate;
use gmv_common::models::{GeocodeFix, GeocodeStats, UnresolvedLocation};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::pagination::{paginate, Page};
use crate::AppState;

/// Column the unresolved table is sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    LastSeen,
    Confidence,
    EventCount,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_seen" => Ok(SortKey::LastSeen),
            "confidence" => Ok(SortKey::Confidence),
            "event_count" => Ok(SortKey::EventCount),
            other => Err(format!("unknown sort column: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UnresolvedQuery {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnresolvedResponse {
    pub sort: SortKey,
    pub order: SortOrder,
    #[serde(flatten)]
    pub page: Page<UnresolvedLocation>,
}

#[derive(Debug, Serialize)]
pub struct FixResponse {
    pub applied: GeocodeFix,
    /// First page of the refreshed unresolved list
    pub unresolved: UnresolvedResponse,
}

#[derive(Debug, Serialize)]
pub struct GeocodeStatsResponse {
    #[serde(flatten)]
    pub backend: GeocodeStats,
    pub cache_version: u64,
    pub cache_pending: usize,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub retried: usize,
}

fn compare(a: &UnresolvedLocation, b: &UnresolvedLocation, key: SortKey) -> Ordering {
    let primary = match key {
        SortKey::LastSeen => a.last_seen.cmp(&b.last_seen),
        // Missing confidence sorts as lowest
        SortKey::Confidence => a
            .confidence
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&b.confidence.unwrap_or(f64::NEG_INFINITY)),
        SortKey::EventCount => a.event_count.cmp(&b.event_count),
    };
    primary.then_with(|| a.raw.cmp(&b.raw))
}

/// Sort the unresolved list in place
pub fn sort_unresolved(rows: &mut [UnresolvedLocation], key: SortKey, order: SortOrder) {
    rows.sort_by(|a, b| match order {
        SortOrder::Asc => compare(a, b, key),
        SortOrder::Desc => compare(b, a, key),
    });
}

async fn unresolved_page(
    state: &AppState,
    sort: SortKey,
    order: SortOrder,
    page: i64,
) -> ApiResult<UnresolvedResponse> {
    let mut rows = state.backend.unresolved_locations().await?;
    sort_unresolved(&mut rows, sort, order);
    Ok(UnresolvedResponse {
        sort,
        order,
        page: paginate(rows, page),
    })
}

/// GET /api/geocode/unresolved?sort=&order=&page=
pub async fn list_unresolved(
    State(state): State<AppState>,
    query: Result<Query<UnresolvedQuery>, QueryRejection>,
) -> ApiResult<Json<UnresolvedResponse>> {
    let Query(query) = query?;
    let sort = match query.sort.as_deref() {
        Some(s) => SortKey::from_str(s).map_err(ApiError::Validation)?,
        None => SortKey::default(),
    };
    let order = match query.order.as_deref() {
        Some(s) => SortOrder::from_str(s).map_err(ApiError::Validation)?,
        None => SortOrder::default(),
    };

    let response = unresolved_page(&state, sort, order, query.page.unwrap_or(1)).await?;
    Ok(Json(response))
}

/// POST /api/geocode/fix
///
/// Validates, forwards the fix, seeds the geocode cache and returns the
/// refreshed first page of the unresolved list.
pub async fn submit_fix(
    State(state): State<AppState>,
    payload: Result<Json<GeocodeFix>, JsonRejection>,
) -> ApiResult<Json<FixResponse>> {
    let Json(mut fix) = payload?;
    fix.raw = fix.raw.trim().to_string();
    fix.validate()?;

    state.backend.submit_geocode_fix(&fix).await?;
    info!(raw = %fix.raw, lat = fix.lat, lng = fix.lng, "Manual geocode fix applied");

    state
        .geocache
        .insert_resolved(&fix.raw, Coordinate::new(fix.lat, fix.lng));
    state.events.emit_lossy(GmvEvent::GeocodeFixApplied {
        raw: fix.raw.clone(),
        lat: fix.lat,
        lng: fix.lng,
        timestamp: Utc::now(),
    });

    let unresolved = unresolved_page(&state, SortKey::default(), SortOrder::default(), 1).await?;

    Ok(Json(FixResponse {
        applied: fix,
        unresolved,
    }))
}

/// GET /api/geocode/stats
pub async fn get_geocode_stats(State(state): State<AppState>) -> ApiResult<Json<GeocodeStatsResponse>> {
    let backend = state.backend.geocode_stats().await?;
    Ok(Json(GeocodeStatsResponse {
        backend,
        cache_version: state.geocache.version(),
        cache_pending: state.geocache.pending_count(),
    }))
}

/// POST /api/geocode/lookups/retry
///
/// Re-queues every location whose background lookup found nothing.
pub async fn retry_lookups(State(state): State<AppState>) -> Json<RetryResponse> {
    let missed = state.geocache.forget_missed();
    let retried = state.geocache.request_lookups(state.backend.clone(), &missed);
    Json(RetryResponse { retried })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(raw: &str, confidence: Option<f64>, event_count: i64, day: u32) -> UnresolvedLocation {
        UnresolvedLocation {
            raw: raw.to_string(),
            normalized: None,
            confidence,
            event_count,
            last_seen: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    fn raws(rows: &[UnresolvedLocation]) -> Vec<&str> {
        rows.iter().map(|r| r.raw.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_most_recent_first() {
        let mut rows = vec![row("a", None, 1, 1), row("b", None, 1, 3), row("c", None, 1, 2)];
        sort_unresolved(&mut rows, SortKey::default(), SortOrder::default());
        assert_eq!(raws(&rows), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_confidence_ascending_puts_missing_first() {
        let mut rows = vec![row("a", Some(0.4), 1, 1), row("b", None, 1, 1), row("c", Some(0.1), 1, 1)];
        sort_unresolved(&mut rows, SortKey::Confidence, SortOrder::Asc);
        assert_eq!(raws(&rows), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_event_count_ties_break_on_raw() {
        let mut rows = vec![row("z", None, 5, 1), row("a", None, 5, 1), row("m", None, 9, 1)];
        sort_unresolved(&mut rows, SortKey::EventCount, SortOrder::Asc);
        assert_eq!(raws(&rows), vec!["a", "z", "m"]);
    }

    #[test]
    fn test_sort_params_parse() {
        assert_eq!("event_count".parse::<SortKey>(), Ok(SortKey::EventCount));
        assert!("name".parse::<SortKey>().is_err());
        assert_eq!("asc".parse::<SortOrder>(), Ok(SortOrder::Asc));
    }
}
