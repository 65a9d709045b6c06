//! Filter/search state shared by the map, timeline and people views
//!
//! `FilterState` is always complete: every field has a value, so it can be
//! written to a URL query string or the local settings store and read back
//! into an identical value. Parsing is lenient (unknown keys and bad values
//! fall back to defaults with a warning) because query strings come from
//! bookmarks and hand-edited URLs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::models::{EventType, MovementEvent};
use crate::{Error, Result};

/// Default lower bound of the year range
pub const DEFAULT_YEAR_MIN: i32 = 1000;
/// Default upper bound of the year range
pub const DEFAULT_YEAR_MAX: i32 = 2100;

/// How the selected people are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// One focal person
    #[default]
    Person,
    /// Focal person plus relatives chosen by the relation toggles
    Family,
    /// Several people side by side
    Compare,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Person => "person",
            ViewMode::Family => "family",
            ViewMode::Compare => "compare",
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "person" => Ok(ViewMode::Person),
            "family" => Ok(ViewMode::Family),
            "compare" => Ok(ViewMode::Compare),
            other => Err(format!("unknown view mode: {}", other)),
        }
    }
}

/// Relative kinds that family mode pulls in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Parents,
    Children,
    Spouses,
    Siblings,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Parents => "parents",
            Relation::Children => "children",
            Relation::Spouses => "spouses",
            Relation::Siblings => "siblings",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "parents" => Ok(Relation::Parents),
            "children" => Ok(Relation::Children),
            "spouses" => Ok(Relation::Spouses),
            "siblings" => Ok(Relation::Siblings),
            other => Err(format!("unknown relation: {}", other)),
        }
    }
}

/// Complete filter/search state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Free-text search over person names and locations
    pub query: String,
    pub mode: ViewMode,
    /// Enabled event types
    pub event_types: BTreeSet<EventType>,
    /// Inclusive lower year bound
    pub year_min: i32,
    /// Inclusive upper year bound
    pub year_max: i32,
    /// Show events whose year cannot be determined
    pub include_undated: bool,
    /// Enabled relation kinds (family mode)
    pub relations: BTreeSet<Relation>,
    /// Enabled sources; empty means every source
    pub sources: BTreeSet<String>,
    /// Selected person ids, in selection order
    pub selected: Vec<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            query: String::new(),
            mode: ViewMode::default(),
            event_types: EventType::ALL.into_iter().collect(),
            year_min: DEFAULT_YEAR_MIN,
            year_max: DEFAULT_YEAR_MAX,
            include_undated: true,
            relations: [Relation::Parents, Relation::Children, Relation::Spouses]
                .into_iter()
                .collect(),
            sources: BTreeSet::new(),
            selected: Vec::new(),
        }
    }
}

/// Query keys owned by the filter state; anything else is ignored on parse
const FILTER_KEYS: &[&str] = &[
    "q", "mode", "event", "year_min", "year_max", "undated", "relation", "source", "selected",
];

impl FilterState {
    /// Serialize to a URL query string (repeated keys for set members)
    ///
    /// Sets are written in their sorted order and `event`/`relation` are always
    /// written, even when empty, so an explicitly empty toggle set survives the
    /// round trip instead of reverting to the default.
    pub fn to_query(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if !self.query.is_empty() {
            pairs.push(("q", self.query.clone()));
        }
        pairs.push(("mode", self.mode.as_str().to_string()));

        if self.event_types.is_empty() {
            pairs.push(("event", String::new()));
        }
        for event_type in &self.event_types {
            pairs.push(("event", event_type.as_str().to_string()));
        }

        pairs.push(("year_min", self.year_min.to_string()));
        pairs.push(("year_max", self.year_max.to_string()));
        pairs.push(("undated", self.include_undated.to_string()));

        if self.relations.is_empty() {
            pairs.push(("relation", String::new()));
        }
        for relation in &self.relations {
            pairs.push(("relation", relation.as_str().to_string()));
        }

        for source in &self.sources {
            pairs.push(("source", source.clone()));
        }
        for id in &self.selected {
            pairs.push(("selected", id.clone()));
        }

        // Serializing a slice of string pairs cannot fail
        serde_urlencoded::to_string(&pairs).unwrap_or_default()
    }

    /// Parse a URL query string into a complete filter state
    ///
    /// Missing keys take their defaults. Only an undecodable query string is an
    /// error; individual bad values are logged and skipped.
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.trim_start_matches('?');
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| Error::Validation(format!("malformed filter query: {}", e)))?;

        let mut state = FilterState::default();
        let mut event_types: Option<BTreeSet<EventType>> = None;
        let mut relations: Option<BTreeSet<Relation>> = None;

        for (key, value) in pairs {
            match key.as_str() {
                "q" => state.query = value,
                "mode" => match value.parse() {
                    Ok(mode) => state.mode = mode,
                    Err(e) => warn!("Ignoring filter value: {}", e),
                },
                "event" => {
                    let set = event_types.get_or_insert_with(BTreeSet::new);
                    if !value.is_empty() {
                        match value.parse() {
                            Ok(event_type) => {
                                set.insert(event_type);
                            }
                            Err(e) => warn!("Ignoring filter value: {}", e),
                        }
                    }
                }
                "year_min" => match value.trim().parse() {
                    Ok(year) => state.year_min = year,
                    Err(_) => warn!("Ignoring non-numeric year_min: {}", value),
                },
                "year_max" => match value.trim().parse() {
                    Ok(year) => state.year_max = year,
                    Err(_) => warn!("Ignoring non-numeric year_max: {}", value),
                },
                "undated" => match value.as_str() {
                    "true" | "1" => state.include_undated = true,
                    "false" | "0" => state.include_undated = false,
                    other => warn!("Ignoring undated flag: {}", other),
                },
                "relation" => {
                    let set = relations.get_or_insert_with(BTreeSet::new);
                    if !value.is_empty() {
                        match value.parse() {
                            Ok(relation) => {
                                set.insert(relation);
                            }
                            Err(e) => warn!("Ignoring filter value: {}", e),
                        }
                    }
                }
                "source" => {
                    if !value.is_empty() {
                        state.sources.insert(value);
                    }
                }
                "selected" => {
                    if !value.is_empty() && !state.selected.contains(&value) {
                        state.selected.push(value);
                    }
                }
                _ => {}
            }
        }

        if let Some(set) = event_types {
            state.event_types = set;
        }
        if let Some(set) = relations {
            state.relations = set;
        }
        if state.year_min > state.year_max {
            std::mem::swap(&mut state.year_min, &mut state.year_max);
        }

        Ok(state)
    }

    /// Whether a query string key belongs to the filter state
    pub fn owns_key(key: &str) -> bool {
        FILTER_KEYS.contains(&key)
    }

    /// Whether an event passes every active filter
    ///
    /// In family mode the selection is not checked here: the backend already
    /// expanded it to the selected people and their relatives.
    pub fn admits(&self, event: &MovementEvent) -> bool {
        if !self.event_types.contains(&event.event_type) {
            return false;
        }

        match event.resolved_year() {
            Some(year) => {
                if year < self.year_min || year > self.year_max {
                    return false;
                }
            }
            None => {
                if !self.include_undated {
                    return false;
                }
            }
        }

        if !self.selected.is_empty() && self.mode != ViewMode::Family {
            if !self.selected.iter().any(|id| id == &event.person_id) {
                return false;
            }
        }

        if !self.sources.is_empty() {
            match &event.source {
                Some(source) if self.sources.contains(source) => {}
                _ => return false,
            }
        }

        if !self.query.is_empty() {
            let needle = self.query.to_lowercase();
            let matches = |field: &Option<String>| {
                field
                    .as_deref()
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            };
            if !matches(&event.person_name) && !matches(&event.location) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(person: &str, event_type: EventType, year: Option<i32>) -> MovementEvent {
        MovementEvent {
            person_id: person.to_string(),
            person_name: Some(format!("Person {}", person)),
            event_type,
            date: None,
            year,
            location: Some("Cork, Ireland".to_string()),
            lat: None,
            lng: None,
            confidence: None,
            source: Some("census".to_string()),
        }
    }

    #[test]
    fn test_default_round_trip() {
        let state = FilterState::default();
        let parsed = FilterState::from_query(&state.to_query()).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_full_state_round_trip() {
        let state = FilterState {
            query: "o'brien & sons, cork".to_string(),
            mode: ViewMode::Compare,
            event_types: [EventType::Migration, EventType::Residence].into_iter().collect(),
            year_min: 1820,
            year_max: 1910,
            include_undated: false,
            relations: BTreeSet::new(),
            sources: ["census, 1901".to_string(), "parish".to_string()].into_iter().collect(),
            selected: vec!["p9".to_string(), "p2".to_string()],
        };
        let query = state.to_query();
        let parsed = FilterState::from_query(&query).unwrap();
        assert_eq!(parsed, state, "query was {}", query);
    }

    #[test]
    fn test_empty_query_is_complete_default() {
        let parsed = FilterState::from_query("").unwrap();
        assert_eq!(parsed, FilterState::default());
        let parsed = FilterState::from_query("?").unwrap();
        assert_eq!(parsed, FilterState::default());
    }

    #[test]
    fn test_bad_values_fall_back_to_defaults() {
        let parsed =
            FilterState::from_query("mode=galaxy&year_min=abc&event=baptism&event=birth").unwrap();
        assert_eq!(parsed.mode, ViewMode::Person);
        assert_eq!(parsed.year_min, DEFAULT_YEAR_MIN);
        assert_eq!(parsed.event_types, [EventType::Birth].into_iter().collect());
    }

    #[test]
    fn test_inverted_year_range_is_swapped() {
        let parsed = FilterState::from_query("year_min=1900&year_max=1800").unwrap();
        assert_eq!((parsed.year_min, parsed.year_max), (1800, 1900));
    }

    #[test]
    fn test_selected_ids_deduplicated_in_order() {
        let parsed = FilterState::from_query("selected=b&selected=a&selected=b").unwrap();
        assert_eq!(parsed.selected, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_year_range_excludes_out_of_bounds() {
        let state = FilterState::from_query("year_min=1850&year_max=1900").unwrap();
        assert!(!state.admits(&event("p1", EventType::Residence, Some(1849))));
        assert!(state.admits(&event("p1", EventType::Residence, Some(1850))));
        assert!(state.admits(&event("p1", EventType::Residence, Some(1900))));
        assert!(!state.admits(&event("p1", EventType::Residence, Some(1901))));
    }

    #[test]
    fn test_undated_events_follow_toggle() {
        let mut state = FilterState::default();
        assert!(state.admits(&event("p1", EventType::Birth, None)));
        state.include_undated = false;
        assert!(!state.admits(&event("p1", EventType::Birth, None)));
    }

    #[test]
    fn test_event_type_and_selection_filters() {
        let mut state = FilterState::default();
        state.event_types.remove(&EventType::Death);
        state.selected = vec!["p1".to_string()];
        assert!(!state.admits(&event("p1", EventType::Death, Some(1900))));
        assert!(state.admits(&event("p1", EventType::Birth, Some(1850))));
        assert!(!state.admits(&event("p2", EventType::Birth, Some(1850))));

        // Family mode leaves relative expansion to the backend
        state.mode = ViewMode::Family;
        assert!(state.admits(&event("p2", EventType::Birth, Some(1850))));
    }

    #[test]
    fn test_source_and_text_filters() {
        let mut state = FilterState::default();
        state.sources.insert("parish".to_string());
        assert!(!state.admits(&event("p1", EventType::Birth, Some(1850))));
        state.sources.insert("census".to_string());
        assert!(state.admits(&event("p1", EventType::Birth, Some(1850))));

        state.query = "CORK".to_string();
        assert!(state.admits(&event("p1", EventType::Birth, Some(1850))));
        state.query = "dublin".to_string();
        assert!(!state.admits(&event("p1", EventType::Birth, Some(1850))));
    }

    #[test]
    fn test_owns_key() {
        assert!(FilterState::owns_key("year_min"));
        assert!(!FilterState::owns_key("style"));
    }
}
