//! Movement transformer: raw per-person events into points and segments
//!
//! Pipeline:
//! 1. Group events by person id (first-seen order)
//! 2. Split each person's events into dated and undated
//! 3. Stable sort dated events by year, then event rank (birth first, death last)
//! 4. Fill missing coordinates from the geocode cache by normalized location
//! 5. Pair consecutive positioned entries into segments and flag them
//!
//! Segments are built per person, so no segment can ever join two people.

use std::collections::{HashMap, HashSet};

use gmv_common::config::QualityConfig;
use gmv_common::geo::{haversine_km, Coordinate};
use gmv_common::models::{
    EventType, MovementEvent, PrecomputedSegment, MAX_PARSEABLE_YEAR, MIN_PARSEABLE_YEAR,
};
use serde::Serialize;

use super::quality::QualityFlags;

/// Where a point's coordinate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    /// Carried on the event by the backend
    Event,
    /// Filled from the client-side geocode cache
    Cache,
    /// Still unresolved
    Unresolved,
}

/// One event ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub person_id: String,
    pub person_name: Option<String>,
    pub event_type: EventType,
    pub year: Option<i32>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub coordinate_source: CoordinateSource,
    pub confidence: Option<f64>,
}

impl MapPoint {
    fn from_event(event: MovementEvent, cache: &HashMap<String, Coordinate>) -> Self {
        let year = event.resolved_year();
        let (coordinate, coordinate_source) = match event.coordinate() {
            Some(c) => (Some(c), CoordinateSource::Event),
            None => match event.location_key().and_then(|key| cache.get(&key).copied()) {
                Some(c) => (Some(c), CoordinateSource::Cache),
                None => (None, CoordinateSource::Unresolved),
            },
        };

        Self {
            person_id: event.person_id,
            person_name: event.person_name,
            event_type: event.event_type,
            year,
            date: event.date,
            location: event.location,
            coordinate,
            coordinate_source,
            confidence: event.confidence,
        }
    }

    pub fn is_positioned(&self) -> bool {
        self.coordinate.is_some()
    }
}

/// All of one person's events, ordered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonTrack {
    pub person_id: String,
    pub person_name: Option<String>,
    /// Dated entries, ascending by year
    pub dated: Vec<MapPoint>,
    /// Entries without a parseable year, in input order
    pub undated: Vec<MapPoint>,
}

/// Endpoint of a segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentEnd {
    pub year: i32,
    pub coordinate: Coordinate,
    pub location: Option<String>,
    pub event_type: Option<EventType>,
    pub confidence: Option<f64>,
}

/// Line between two consecutive positioned entries of one person
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub person_id: String,
    pub person_name: Option<String>,
    pub from: SegmentEnd,
    pub to: SegmentEnd,
    pub distance_km: f64,
    pub flags: QualityFlags,
}

/// Output of the transformer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MovementView {
    /// Every event, positioned or not
    pub points: Vec<MapPoint>,
    /// Segments grouped by person, each person's in ascending year order
    pub segments: Vec<Segment>,
    /// Distinct normalized locations with no coordinate anywhere
    pub misses: Vec<String>,
    /// Person ids in first-seen order
    pub persons: Vec<(String, Option<String>)>,
}

/// Group events by person and order each person's dated events
pub fn group_by_person(
    events: Vec<MovementEvent>,
    cache: &HashMap<String, Coordinate>,
) -> Vec<PersonTrack> {
    let mut order: Vec<String> = Vec::new();
    let mut tracks: HashMap<String, PersonTrack> = HashMap::new();

    for event in events {
        let point = MapPoint::from_event(event, cache);
        let track = tracks.entry(point.person_id.clone()).or_insert_with(|| {
            order.push(point.person_id.clone());
            PersonTrack {
                person_id: point.person_id.clone(),
                person_name: None,
                dated: Vec::new(),
                undated: Vec::new(),
            }
        });

        if track.person_name.is_none() {
            track.person_name = point.person_name.clone();
        }

        if point.year.is_some() {
            track.dated.push(point);
        } else {
            track.undated.push(point);
        }
    }

    order
        .into_iter()
        .filter_map(|id| tracks.remove(&id))
        .map(|mut track| {
            // sort_by_key is stable: same-year, same-rank events keep input order
            track
                .dated
                .sort_by_key(|p| (p.year.unwrap_or(i32::MAX), p.event_type.rank()));
            track
        })
        .collect()
}

/// Derive segments for one ordered track
fn track_segments(track: &PersonTrack, thresholds: &QualityConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut previous: Option<&MapPoint> = None;
    let mut seen_death = false;

    for (index, point) in track.dated.iter().enumerate() {
        // A birth after anything else, or any event after a death
        let impossible = (point.event_type == EventType::Birth && index > 0) || seen_death;

        if let (Some(prev), Some(to_coord)) = (previous, point.coordinate) {
            if let (Some(from_coord), Some(from_year), Some(to_year)) =
                (prev.coordinate, prev.year, point.year)
            {
                let distance_km = haversine_km(from_coord, to_coord);
                segments.push(Segment {
                    person_id: track.person_id.clone(),
                    person_name: track.person_name.clone(),
                    from: SegmentEnd {
                        year: from_year,
                        coordinate: from_coord,
                        location: prev.location.clone(),
                        event_type: Some(prev.event_type),
                        confidence: prev.confidence,
                    },
                    to: SegmentEnd {
                        year: to_year,
                        coordinate: to_coord,
                        location: point.location.clone(),
                        event_type: Some(point.event_type),
                        confidence: point.confidence,
                    },
                    distance_km,
                    flags: QualityFlags::assess(
                        distance_km,
                        to_year.saturating_sub(from_year),
                        (prev.confidence, point.confidence),
                        impossible,
                        thresholds,
                    ),
                });
            }
        }

        if point.is_positioned() {
            previous = Some(point);
        }
        if point.event_type == EventType::Death {
            seen_death = true;
        }
    }

    segments
}

/// Run the full pipeline over raw events
///
/// `cache` maps normalized location keys to resolved coordinates. Call again
/// with a fresh snapshot whenever the cache changes.
pub fn derive(
    events: Vec<MovementEvent>,
    cache: &HashMap<String, Coordinate>,
    thresholds: &QualityConfig,
) -> MovementView {
    let tracks = group_by_person(events, cache);

    let mut view = MovementView::default();
    let mut missed: HashSet<String> = HashSet::new();

    for track in &tracks {
        view.persons.push((track.person_id.clone(), track.person_name.clone()));
        view.segments.extend(track_segments(track, thresholds));

        for point in track.dated.iter().chain(track.undated.iter()) {
            if !point.is_positioned() {
                if let Some(key) = point.location.as_deref().and_then(gmv_common::models::normalize_location) {
                    if missed.insert(key.clone()) {
                        view.misses.push(key);
                    }
                }
            }
        }
    }

    for track in tracks {
        view.points.extend(track.dated);
        view.points.extend(track.undated);
    }

    view
}

/// Convert backend-precomputed segments, re-flagging them locally
///
/// The backend does not report event types, so only confidence and speed
/// flags apply. Segments whose years are out of order or outside the
/// parseable range are dropped.
pub fn from_precomputed(
    segments: Vec<PrecomputedSegment>,
    thresholds: &QualityConfig,
) -> MovementView {
    let mut view = MovementView::default();
    let mut seen: HashSet<String> = HashSet::new();

    for seg in segments {
        let (Some(from), Some(to)) = (
            Coordinate::from_parts(Some(seg.from_lat), Some(seg.from_lng)),
            Coordinate::from_parts(Some(seg.to_lat), Some(seg.to_lng)),
        ) else {
            continue;
        };
        let years = MIN_PARSEABLE_YEAR..=MAX_PARSEABLE_YEAR;
        if !years.contains(&seg.from_year)
            || !years.contains(&seg.to_year)
            || seg.to_year < seg.from_year
        {
            continue;
        }

        if seen.insert(seg.person_id.clone()) {
            view.persons.push((seg.person_id.clone(), seg.person_name.clone()));
        }

        let distance_km = haversine_km(from, to);
        view.segments.push(Segment {
            person_id: seg.person_id,
            person_name: seg.person_name,
            from: SegmentEnd {
                year: seg.from_year,
                coordinate: from,
                location: seg.from_location,
                event_type: None,
                confidence: seg.confidence,
            },
            to: SegmentEnd {
                year: seg.to_year,
                coordinate: to,
                location: seg.to_location,
                event_type: None,
                confidence: seg.confidence,
            },
            distance_km,
            flags: QualityFlags::assess(
                distance_km,
                seg.to_year.saturating_sub(seg.from_year),
                (seg.confidence, seg.confidence),
                false,
                thresholds,
            ),
        });
    }

    // Stable sort keeps persons grouped in first-seen order
    let rank: HashMap<String, usize> = view
        .persons
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.clone(), i))
        .collect();
    view.segments
        .sort_by_key(|s| (rank.get(&s.person_id).copied().unwrap_or(usize::MAX), s.from.year));

    view
}
