//! Data-quality flags for derived segments

use gmv_common::config::QualityConfig;
use serde::Serialize;

/// Flags attached to a segment for rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityFlags {
    /// Either endpoint's geocode confidence is below threshold
    pub low_confidence: bool,
    /// Implied travel speed is implausible for the period
    pub suspicious_speed: bool,
    /// Event order contradicts life events (birth not first, anything after death)
    pub impossible_transition: bool,
}

/// Single worst quality level, used for color-coding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Ok,
    LowConfidence,
    SuspiciousSpeed,
    Impossible,
}

impl QualityFlags {
    /// Assess a segment
    ///
    /// `year_gap` is clamped to at least one year: dates are year-granular, so
    /// two events in the same year may be up to a year apart.
    pub fn assess(
        distance_km: f64,
        year_gap: i32,
        confidences: (Option<f64>, Option<f64>),
        impossible_transition: bool,
        thresholds: &QualityConfig,
    ) -> Self {
        let below = |c: Option<f64>| c.map(|c| c < thresholds.low_confidence_threshold).unwrap_or(false);
        let years = year_gap.max(1) as f64;

        Self {
            low_confidence: below(confidences.0) || below(confidences.1),
            suspicious_speed: distance_km / years > thresholds.max_km_per_year,
            impossible_transition,
        }
    }

    pub fn level(&self) -> QualityLevel {
        if self.impossible_transition {
            QualityLevel::Impossible
        } else if self.suspicious_speed {
            QualityLevel::SuspiciousSpeed
        } else if self.low_confidence {
            QualityLevel::LowConfidence
        } else {
            QualityLevel::Ok
        }
    }

    pub fn any(&self) -> bool {
        self.level() != QualityLevel::Ok
    }
}
