//! Core types for the BioScan pipeline
//!
//! This module defines the data structures that flow through each stage:
//! per-frame biometric samples, the derived vitals, history records and the
//! encoded report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScanError;

/// One observation per processed frame while a session is sampling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiometricSample {
    /// Milliseconds since sampling started (monotonic)
    pub timestamp_ms: u64,
    /// Mean green intensity of the forehead region (0-255)
    pub green_channel_mean: f64,
    /// Normalized nose-tip y coordinate (0-1)
    pub nose_vertical_position: f64,
    /// Normalized vertical eyelid separation (>= 0)
    pub eye_aspect_distance: f64,
}

impl BiometricSample {
    /// Create a sample, clamping the landmark-derived fields into their domains
    pub fn new(
        timestamp_ms: u64,
        green_channel_mean: f64,
        nose_vertical_position: f64,
        eye_aspect_distance: f64,
    ) -> Self {
        Self {
            timestamp_ms,
            green_channel_mean,
            nose_vertical_position: nose_vertical_position.clamp(0.0, 1.0),
            eye_aspect_distance: eye_aspect_distance.max(0.0),
        }
    }
}

/// Scan session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// No face, or face not yet stable for a debounce interval
    Idle,
    /// Face confirmed, waiting for exposure/autofocus to settle
    Calibrating,
    /// Recording one sample per frame until the window elapses
    Sampling,
    /// Estimation has run; terminal for this attempt
    Completed,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Calibrating => "calibrating",
            ScanState::Sampling => "sampling",
            ScanState::Completed => "completed",
        }
    }
}

/// Eyelid edge state used for blink debouncing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlinkEdge {
    #[default]
    Open,
    Closed,
}

/// Vital signs estimated from one completed scan window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalsResult {
    /// Heart rate (beats per minute)
    pub heart_rate_bpm: u32,
    /// Respiration rate (breaths per minute)
    pub respiration_rate_brpm: u32,
    /// Blink rate (blinks per minute)
    pub blink_rate_per_min: u32,
    /// Inter-peak interval dispersion (ms), a proxy for HRV
    pub hrv_ms: f64,
}

/// Wellness index on a 1-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct WellnessIndex(u8);

impl WellnessIndex {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    /// Validate an externally supplied index
    pub fn new(value: i64) -> Result<Self, ScanError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScanError::InvalidWellnessIndex(value))
        }
    }

    /// Compose an index from 0-100 sub-scores (mean, rounded, clamped to 1-100).
    ///
    /// Returns `None` when no sub-scores are supplied.
    pub fn from_sub_scores(sub_scores: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = sub_scores.iter().copied().filter(|s| s.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let clamped = mean.round().clamp(Self::MIN as f64, Self::MAX as f64);
        Some(Self(clamped as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for WellnessIndex {
    type Error = ScanError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WellnessIndex> for u8 {
    fn from(index: WellnessIndex) -> Self {
        index.0
    }
}

/// One past outcome in the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub age_bucket: String,
    pub wellness_index: WellnessIndex,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Create a record stamped with the current time
    pub fn now(age_bucket: impl Into<String>, wellness_index: WellnessIndex) -> Self {
        Self {
            age_bucket: age_bucket.into(),
            wellness_index,
            recorded_at: Utc::now(),
        }
    }
}

/// Population percentile for a subject, computed from a history snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentileResult {
    /// Percentile (0-100)
    pub percentile: u8,
    /// Number of matching records the percentile was computed from
    pub sample_size: usize,
}

/// Population ranking attached to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessRanking {
    pub age_bucket: String,
    pub wellness_index: WellnessIndex,
    pub percentile: u8,
}

/// Composite outcome of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessReport {
    pub session_id: Uuid,
    pub vitals: VitalsResult,
    pub ranking: Option<WellnessRanking>,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report provenance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    pub session_id: String,
    pub window_ms: u64,
    pub computed_at_utc: String,
}

/// Complete encoded report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub vitals: VitalsResult,
    pub ranking: Option<WellnessRanking>,
}
