//! Map renderer: movement view into GeoJSON layers and legend
//!
//! The page hands the feature collection straight to Leaflet's GeoJSON layer;
//! styling reads the `color` property on each feature.

use std::collections::HashMap;
use std::str::FromStr;

use gmv_common::geo::{great_circle_arc, Coordinate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::quality::QualityLevel;
use super::transform::{MapPoint, MovementView, Segment};

/// Points sampled along a great-circle arc
pub const ARC_STEPS: usize = 24;

/// Person palette (colorblind-friendly, Okabe-Ito plus extras)
const PALETTE: &[&str] = &[
    "#0072b2", "#e69f00", "#009e73", "#cc79a7", "#56b4e9", "#d55e00", "#f0e442", "#000000",
    "#8c564b", "#7f7f7f", "#17becf", "#bcbd22",
];

/// How segments are drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Line,
    Arc,
}

impl FromStr for LineStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" => Ok(LineStyle::Line),
            "arc" => Ok(LineStyle::Arc),
            other => Err(format!("unknown line style: {}", other)),
        }
    }
}

/// How features are colored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Person,
    Quality,
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(ColorMode::Person),
            "quality" => Ok(ColorMode::Quality),
            other => Err(format!("unknown color mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub style: LineStyle,
    pub color: ColorMode,
}

/// GeoJSON geometry (only the two kinds drawn here)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: Geometry,
    pub properties: Value,
}

impl Feature {
    fn new(geometry: Geometry, properties: Value) -> Self {
        Self {
            kind: "Feature",
            geometry,
            properties,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

/// One legend entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swatch {
    pub label: String,
    pub color: &'static str,
    /// Person id, absent for quality swatches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
}

/// Counts shown in the map HUD
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Legend {
    pub persons: usize,
    pub points: usize,
    pub positioned: usize,
    pub unpositioned: usize,
    pub segments: usize,
    pub low_confidence: usize,
    pub suspicious_speed: usize,
    pub impossible_transition: usize,
    pub geocode_misses: usize,
    pub pending_lookups: usize,
    pub swatches: Vec<Swatch>,
}

/// Everything the page needs to draw one map view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayers {
    pub features: FeatureCollection,
    /// Events with no coordinate, listed beside the map
    pub unpositioned: Vec<MapPoint>,
    pub legend: Legend,
}

/// Stable palette color for a person id (FNV-1a)
pub fn person_color(person_id: &str) -> &'static str {
    let mut hash: u32 = 0x811c9dc5;
    for byte in person_id.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    PALETTE[(hash as usize) % PALETTE.len()]
}

pub fn quality_color(level: QualityLevel) -> &'static str {
    match level {
        QualityLevel::Ok => "#2e7d32",
        QualityLevel::LowConfidence => "#f9a825",
        QualityLevel::SuspiciousSpeed => "#ef6c00",
        QualityLevel::Impossible => "#c62828",
    }
}

fn quality_label(level: QualityLevel) -> &'static str {
    match level {
        QualityLevel::Ok => "OK",
        QualityLevel::LowConfidence => "Low confidence",
        QualityLevel::SuspiciousSpeed => "Suspicious speed",
        QualityLevel::Impossible => "Impossible transition",
    }
}

fn segment_geometry(segment: &Segment, style: LineStyle) -> Geometry {
    let path: Vec<Coordinate> = match style {
        LineStyle::Line => vec![segment.from.coordinate, segment.to.coordinate],
        LineStyle::Arc => great_circle_arc(segment.from.coordinate, segment.to.coordinate, ARC_STEPS),
    };
    Geometry::LineString(path.into_iter().map(Coordinate::to_position).collect())
}

/// Render a movement view
///
/// `pending_lookups` is reported in the legend only; it comes from the
/// geocode cache at render time.
pub fn render(view: &MovementView, options: RenderOptions, pending_lookups: usize) -> MapLayers {
    let mut features = Vec::with_capacity(view.points.len() + view.segments.len());
    let mut unpositioned = Vec::new();
    let mut legend = Legend {
        persons: view.persons.len(),
        points: view.points.len(),
        segments: view.segments.len(),
        geocode_misses: view.misses.len(),
        pending_lookups,
        ..Default::default()
    };

    // Points carry no flags; in quality mode they are drawn neutral
    let point_color = |p: &MapPoint| match options.color {
        ColorMode::Person => person_color(&p.person_id),
        ColorMode::Quality => quality_color(QualityLevel::Ok),
    };

    for point in &view.points {
        let Some(coordinate) = point.coordinate else {
            unpositioned.push(point.clone());
            continue;
        };
        legend.positioned += 1;
        features.push(Feature::new(
            Geometry::Point(coordinate.to_position()),
            json!({
                "kind": "point",
                "person_id": point.person_id,
                "person_name": point.person_name,
                "event_type": point.event_type,
                "year": point.year,
                "date": point.date,
                "location": point.location,
                "confidence": point.confidence,
                "coordinate_source": point.coordinate_source,
                "color": point_color(point),
            }),
        ));
    }
    legend.unpositioned = unpositioned.len();

    for segment in &view.segments {
        let level = segment.flags.level();
        if segment.flags.low_confidence {
            legend.low_confidence += 1;
        }
        if segment.flags.suspicious_speed {
            legend.suspicious_speed += 1;
        }
        if segment.flags.impossible_transition {
            legend.impossible_transition += 1;
        }

        let color = match options.color {
            ColorMode::Person => person_color(&segment.person_id),
            ColorMode::Quality => quality_color(level),
        };

        features.push(Feature::new(
            segment_geometry(segment, options.style),
            json!({
                "kind": "segment",
                "person_id": segment.person_id,
                "person_name": segment.person_name,
                "from_year": segment.from.year,
                "to_year": segment.to.year,
                "from_location": segment.from.location,
                "to_location": segment.to.location,
                "distance_km": (segment.distance_km * 10.0).round() / 10.0,
                "flags": segment.flags,
                "quality": level,
                "color": color,
            }),
        ));
    }

    legend.swatches = match options.color {
        ColorMode::Person => view
            .persons
            .iter()
            .map(|(id, name)| Swatch {
                label: name.clone().unwrap_or_else(|| id.clone()),
                color: person_color(id),
                person_id: Some(id.clone()),
            })
            .collect(),
        ColorMode::Quality => [
            QualityLevel::Ok,
            QualityLevel::LowConfidence,
            QualityLevel::SuspiciousSpeed,
            QualityLevel::Impossible,
        ]
        .into_iter()
        .map(|level| Swatch {
            label: quality_label(level).to_string(),
            color: quality_color(level),
            person_id: None,
        })
        .collect(),
    };

    MapLayers {
        features: FeatureCollection {
            kind: "FeatureCollection",
            features,
        },
        unpositioned,
        legend,
    }
}

/// Count features per kind; used by the HUD tests and debug logging
pub fn feature_kinds(layers: &MapLayers) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for feature in &layers.features.features {
        if let Some(kind) = feature.properties.get("kind").and_then(Value::as_str) {
            *counts.entry(kind.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::transform::derive;
    use gmv_common::config::QualityConfig;
    use gmv_common::models::{EventType, MovementEvent};

    fn ev(person: &str, kind: EventType, year: i32, coord: Option<(f64, f64)>) -> MovementEvent {
        MovementEvent {
            person_id: person.to_string(),
            person_name: Some(person.to_uppercase()),
            event_type: kind,
            date: Some(year.to_string()),
            year: None,
            location: Some(format!("{} place {}", person, year)),
            lat: coord.map(|c| c.0),
            lng: coord.map(|c| c.1),
            confidence: Some(0.9),
            source: None,
        }
    }

    fn sample_view() -> MovementView {
        derive(
            vec![
                ev("p1", EventType::Birth, 1840, Some((51.9, -8.47))),
                ev("p1", EventType::Residence, 1860, Some((42.36, -71.06))),
                ev("p1", EventType::Residence, 1865, None),
                ev("p2", EventType::Birth, 1850, Some((53.35, -6.26))),
            ],
            &HashMap::new(),
            &QualityConfig::default(),
        )
    }

    #[test]
    fn test_person_color_is_stable() {
        assert_eq!(person_color("I0001"), person_color("I0001"));
        assert!(PALETTE.contains(&person_color("I0002")));
    }

    #[test]
    fn test_line_style_emits_two_positions() {
        let layers = render(&sample_view(), RenderOptions::default(), 0);
        let segment = layers
            .features
            .features
            .iter()
            .find(|f| f.properties["kind"] == "segment")
            .unwrap();
        match &segment.geometry {
            Geometry::LineString(coords) => {
                assert_eq!(coords.len(), 2);
                // GeoJSON order is [lng, lat]
                assert_eq!(coords[0], [-8.47, 51.9]);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_arc_style_samples_great_circle() {
        let options = RenderOptions {
            style: LineStyle::Arc,
            color: ColorMode::Person,
        };
        let layers = render(&sample_view(), options, 0);
        let segment = layers
            .features
            .features
            .iter()
            .find(|f| f.properties["kind"] == "segment")
            .unwrap();
        match &segment.geometry {
            Geometry::LineString(coords) => assert_eq!(coords.len(), ARC_STEPS + 1),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_legend_counts() {
        let layers = render(&sample_view(), RenderOptions::default(), 3);
        let legend = &layers.legend;

        assert_eq!(legend.persons, 2);
        assert_eq!(legend.points, 4);
        assert_eq!(legend.positioned, 3);
        assert_eq!(legend.unpositioned, 1);
        assert_eq!(legend.segments, 1);
        assert_eq!(legend.geocode_misses, 1);
        assert_eq!(legend.pending_lookups, 3);
        assert_eq!(legend.swatches.len(), 2);
        assert_eq!(layers.unpositioned.len(), 1);

        let kinds = feature_kinds(&layers);
        assert_eq!(kinds.get("point"), Some(&3));
        assert_eq!(kinds.get("segment"), Some(&1));
    }

    #[test]
    fn test_quality_coloring_uses_worst_flag() {
        // Cork to Boston in one year is too fast
        let view = derive(
            vec![
                ev("p1", EventType::Birth, 1840, Some((51.9, -8.47))),
                ev("p1", EventType::Residence, 1841, Some((42.36, -71.06))),
            ],
            &HashMap::new(),
            &QualityConfig::default(),
        );
        let options = RenderOptions {
            style: LineStyle::Line,
            color: ColorMode::Quality,
        };
        let layers = render(&view, options, 0);
        let segment = layers
            .features
            .features
            .iter()
            .find(|f| f.properties["kind"] == "segment")
            .unwrap();

        assert_eq!(segment.properties["quality"], "suspicious_speed");
        assert_eq!(
            segment.properties["color"],
            quality_color(QualityLevel::SuspiciousSpeed)
        );
        assert_eq!(layers.legend.suspicious_speed, 1);
        assert_eq!(layers.legend.swatches.len(), 4);
    }

    #[test]
    fn test_geometry_serializes_as_geojson() {
        let json = serde_json::to_value(Geometry::Point([1.0, 2.0])).unwrap();
        assert_eq!(json, json!({"type": "Point", "coordinates": [1.0, 2.0]}));
    }
}
