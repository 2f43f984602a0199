//! Pipeline orchestration
//!
//! This module provides the public API for BioScan Vitals.
//! It ties sessions, the shared history ledger and the report encoder together.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::{ScanConfig, ScanProfile};
use crate::encoder::ReportEncoder;
use crate::error::ScanError;
use crate::frame::FrameReading;
use crate::ledger::HistoryLedger;
use crate::session::{ScanSession, SessionEvent};
use crate::types::{VitalsResult, WellnessIndex, WellnessRanking, WellnessReport};

/// Estimate vitals from a recorded sequence of frame readings.
///
/// Drives a fresh session over `readings` in order. Returns `None` when the
/// readings end before a full window has been sampled.
///
/// # Example
/// ```ignore
/// let vitals = estimate_vitals(&readings, ScanProfile::Standard.config())?;
/// ```
pub fn estimate_vitals(
    readings: &[FrameReading],
    config: ScanConfig,
) -> Result<Option<VitalsResult>, ScanError> {
    let mut session = ScanSession::new(config)?;
    Ok(drive(&mut session, readings))
}

/// Feed readings until the session completes
fn drive(session: &mut ScanSession, readings: &[FrameReading]) -> Option<VitalsResult> {
    for reading in readings {
        if let SessionEvent::Completed(vitals) = session.observe(reading) {
            return Some(vitals);
        }
    }
    None
}

/// Stateful processor sharing one history ledger across sessions.
///
/// Sessions are handed out per subject; the ledger is shared, so processors
/// cloned across threads rank against the same history.
pub struct BioScanProcessor {
    config: ScanConfig,
    ledger: Arc<HistoryLedger>,
    encoder: ReportEncoder,
}

impl BioScanProcessor {
    /// Create a processor after validating its configuration
    pub fn new(config: ScanConfig, ledger: Arc<HistoryLedger>) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            config,
            ledger,
            encoder: ReportEncoder::new(),
        })
    }

    /// Create a processor for a named profile
    pub fn with_profile(profile: ScanProfile, ledger: Arc<HistoryLedger>) -> Result<Self, ScanError> {
        Self::new(profile.config(), ledger)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<HistoryLedger> {
        &self.ledger
    }

    /// Start a fresh session with this processor's configuration
    pub fn new_session(&self) -> Result<ScanSession, ScanError> {
        ScanSession::new(self.config)
    }

    /// Build a report for finished vitals.
    ///
    /// With an `(age_bucket, wellness_index)` outcome, the index is ranked
    /// against the history as it stood before this scan and then appended.
    pub fn finalize(
        &self,
        session_id: Uuid,
        vitals: VitalsResult,
        outcome: Option<(&str, WellnessIndex)>,
    ) -> Result<WellnessReport, ScanError> {
        let ranking = match outcome {
            Some((age_bucket, wellness_index)) => {
                let result = self.ledger.rank_and_record(age_bucket, wellness_index)?;
                log::debug!(
                    "scan {}: index {} ranked at p{} of {} in {}",
                    session_id,
                    wellness_index.value(),
                    result.percentile,
                    result.sample_size,
                    age_bucket
                );
                Some(WellnessRanking {
                    age_bucket: age_bucket.to_string(),
                    wellness_index,
                    percentile: result.percentile,
                })
            }
            None => None,
        };

        Ok(WellnessReport {
            session_id,
            vitals,
            ranking,
        })
    }

    /// Build a report from a completed session
    pub fn finalize_session(
        &self,
        session: &ScanSession,
        outcome: Option<(&str, WellnessIndex)>,
    ) -> Result<WellnessReport, ScanError> {
        let vitals = session.vitals()?;
        self.finalize(session.id(), vitals, outcome)
    }

    /// Run a whole scan over recorded readings.
    ///
    /// Returns `None` (and records nothing) if the readings never complete a
    /// window.
    pub fn run(
        &self,
        readings: &[FrameReading],
        outcome: Option<(&str, WellnessIndex)>,
    ) -> Result<Option<WellnessReport>, ScanError> {
        let mut session = self.new_session()?;
        match drive(&mut session, readings) {
            Some(vitals) => Ok(Some(self.finalize(session.id(), vitals, outcome)?)),
            None => {
                log::warn!(
                    "scan {}: readings ended in {} before the window completed",
                    session.id(),
                    session.state().as_str()
                );
                Ok(None)
            }
        }
    }

    /// Encode a report to JSON
    pub fn encode_report(&self, report: &WellnessReport) -> Result<String, ScanError> {
        self.encoder.encode_to_json(report, self.config.window_ms)
    }
}
