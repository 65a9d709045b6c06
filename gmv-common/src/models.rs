//! Wire types shared between the backend client and the UI API
//!
//! These mirror the remote genealogy API's JSON shapes. Optional fields are
//! tolerated everywhere because uploaded trees are frequently incomplete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::geo::Coordinate;

/// Earliest year accepted when parsing free-form dates
pub const MIN_PARSEABLE_YEAR: i32 = 100;
/// Latest year accepted when parsing free-form dates
pub const MAX_PARSEABLE_YEAR: i32 = 2200;

/// One uploaded genealogical dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A person in a tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub occupation: Option<String>,
}

/// Kind of life event that places a person somewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Birth,
    Death,
    Residence,
    Migration,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Birth,
        EventType::Death,
        EventType::Residence,
        EventType::Migration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Birth => "birth",
            EventType::Death => "death",
            EventType::Residence => "residence",
            EventType::Migration => "migration",
        }
    }

    /// Ordering within a single year: birth first, death last
    pub fn rank(&self) -> u8 {
        match self {
            EventType::Birth => 0,
            EventType::Residence | EventType::Migration => 1,
            EventType::Death => 2,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "birth" => Ok(EventType::Birth),
            "death" => Ok(EventType::Death),
            "residence" => Ok(EventType::Residence),
            "migration" => Ok(EventType::Migration),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

/// A dated (possibly partially) location event for one person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementEvent {
    pub person_id: String,
    #[serde(default)]
    pub person_name: Option<String>,
    pub event_type: EventType,
    /// Free-form date as recorded in the source ("ABT 1850", "1850-03-02", ...)
    #[serde(default)]
    pub date: Option<String>,
    /// Year already extracted by the backend, if it managed to
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

impl MovementEvent {
    /// Year used for ordering: the explicit year, else one parsed from `date`
    pub fn resolved_year(&self) -> Option<i32> {
        self.year
            .filter(|y| (MIN_PARSEABLE_YEAR..=MAX_PARSEABLE_YEAR).contains(y))
            .or_else(|| self.date.as_deref().and_then(parse_year))
    }

    /// Coordinate carried on the event itself
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.lat, self.lng)
    }

    /// Normalized location key for geocode cache lookups
    pub fn location_key(&self) -> Option<String> {
        self.location.as_deref().and_then(normalize_location)
    }
}

/// Segment as precomputed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedSegment {
    pub person_id: String,
    #[serde(default)]
    pub person_name: Option<String>,
    pub from_year: i32,
    pub to_year: i32,
    pub from_lat: f64,
    pub from_lng: f64,
    pub to_lat: f64,
    pub to_lng: f64,
    #[serde(default)]
    pub from_location: Option<String>,
    #[serde(default)]
    pub to_location: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A location string the backend geocoder could not confidently resolve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedLocation {
    pub raw: String,
    #[serde(default)]
    pub normalized: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub event_count: i64,
    pub last_seen: DateTime<Utc>,
}

/// Aggregate geocoder statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodeStats {
    pub total: i64,
    pub resolved: i64,
    pub unresolved: i64,
    #[serde(default)]
    pub manual: i64,
}

/// Manual coordinate correction for an unresolved location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeFix {
    pub raw: String,
    pub lat: f64,
    pub lng: f64,
}

impl GeocodeFix {
    /// Validate the fix form: non-empty location, lat/lng in range
    pub fn validate(&self) -> crate::Result<()> {
        if self.raw.trim().is_empty() {
            return Err(crate::Error::Validation("location must not be empty".to_string()));
        }
        crate::geo::validate_lat_lng(self.lat, self.lng)
    }
}

/// Result of a single geocode lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeocodeHit {
    pub lat: f64,
    pub lng: f64,
}

/// Summary counts for a tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub people: i64,
    pub events: i64,
    pub places: i64,
    #[serde(default)]
    pub events_by_type: BTreeMap<String, i64>,
    #[serde(default)]
    pub earliest_year: Option<i32>,
    #[serde(default)]
    pub latest_year: Option<i32>,
}

/// Extract a year from a free-form genealogical date
///
/// Takes the first run of 3-4 ASCII digits that falls within
/// [`MIN_PARSEABLE_YEAR`, `MAX_PARSEABLE_YEAR`]. Day numbers ("12 MAR 1850")
/// are skipped because they are too short.
pub fn parse_year(date: &str) -> Option<i32> {
    let bytes = date.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let run = &date[start..i];
            if (3..=4).contains(&run.len()) {
                if let Ok(year) = run.parse::<i32>() {
                    if (MIN_PARSEABLE_YEAR..=MAX_PARSEABLE_YEAR).contains(&year) {
                        return Some(year);
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Normalize a location string into a cache key
///
/// Lowercases, collapses whitespace, tightens the spacing around commas and
/// strips trailing punctuation. Empty results map to `None`.
pub fn normalize_location(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let joined = collapsed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let trimmed = joined
        .trim_end_matches(|c: char| c == '.' || c == ';' || c == ',' || c.is_whitespace())
        .to_lowercase();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_variants() {
        assert_eq!(parse_year("1850"), Some(1850));
        assert_eq!(parse_year("ABT 1850"), Some(1850));
        assert_eq!(parse_year("12 MAR 1850"), Some(1850));
        assert_eq!(parse_year("1850-03-02"), Some(1850));
        assert_eq!(parse_year("BEF. 1900"), Some(1900));
        assert_eq!(parse_year("c. 987"), Some(987));
    }

    #[test]
    fn test_parse_year_unknown() {
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("?"), None);
        assert_eq!(parse_year("unknown"), None);
        assert_eq!(parse_year("12 MAR"), None);
        assert_eq!(parse_year("99999"), None);
    }

    #[test]
    fn test_resolved_year_prefers_explicit_year() {
        let event = MovementEvent {
            person_id: "p1".into(),
            person_name: None,
            event_type: EventType::Residence,
            date: Some("ABT 1850".into()),
            year: Some(1851),
            location: None,
            lat: None,
            lng: None,
            confidence: None,
            source: None,
        };
        assert_eq!(event.resolved_year(), Some(1851));
    }

    #[test]
    fn test_normalize_location() {
        assert_eq!(
            normalize_location("  Cork ,  Ireland. "),
            Some("cork, ireland".to_string())
        );
        assert_eq!(
            normalize_location("New   York,NY"),
            Some("new york, ny".to_string())
        );
        assert_eq!(normalize_location(" ,. "), None);
    }

    #[test]
    fn test_event_type_wire_format() {
        let json = serde_json::to_string(&EventType::Migration).unwrap();
        assert_eq!(json, "\"migration\"");
        assert_eq!("Birth".parse::<EventType>(), Ok(EventType::Birth));
        assert!("baptism".parse::<EventType>().is_err());
    }

    #[test]
    fn test_movement_event_tolerates_missing_fields() {
        let event: MovementEvent =
            serde_json::from_str(r#"{"person_id":"p1","event_type":"birth"}"#).unwrap();
        assert_eq!(event.resolved_year(), None);
        assert!(event.coordinate().is_none());
        assert!(event.location_key().is_none());
    }

    #[test]
    fn test_geocode_fix_validation() {
        let ok = GeocodeFix { raw: "Cork".into(), lat: 51.9, lng: -8.47 };
        assert!(ok.validate().is_ok());

        let bad_lat = GeocodeFix { raw: "Cork".into(), lat: 95.0, lng: 0.0 };
        assert!(bad_lat.validate().is_err());

        let empty = GeocodeFix { raw: "  ".into(), lat: 0.0, lng: 0.0 };
        assert!(empty.validate().is_err());
    }
}
