//! Report encoding
//!
//! Wraps a wellness report with producer and provenance metadata, and renders
//! vitals as the plain key/value biometrics handed to the external analysis
//! service.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::error::ScanError;
use crate::types::{ReportPayload, ReportProducer, ReportProvenance, VitalsResult, WellnessReport};
use crate::{BIOSCAN_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder for scan report payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a report produced from a window of `window_ms`
    pub fn encode(&self, report: &WellnessReport, window_ms: u64) -> ReportPayload {
        ReportPayload {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: BIOSCAN_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: ReportProvenance {
                session_id: report.session_id.to_string(),
                window_ms,
                computed_at_utc: Utc::now().to_rfc3339(),
            },
            vitals: report.vitals,
            ranking: report.ranking.clone(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, report: &WellnessReport, window_ms: u64) -> Result<String, ScanError> {
        let payload = self.encode(report, window_ms);
        serde_json::to_string_pretty(&payload).map_err(ScanError::JsonError)
    }

    /// Vitals as human-readable key/value pairs for an analysis request
    pub fn biometrics(vitals: &VitalsResult) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("heart_rate".to_string(), format!("{} bpm", vitals.heart_rate_bpm));
        map.insert(
            "respiration_rate".to_string(),
            format!("{} breaths/min", vitals.respiration_rate_brpm),
        );
        map.insert(
            "blink_rate".to_string(),
            format!("{} blinks/min", vitals.blink_rate_per_min),
        );
        map.insert("hrv".to_string(), format!("{:.1} ms", vitals.hrv_ms));
        map
    }
}
