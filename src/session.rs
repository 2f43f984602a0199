//! Scan session state machine
//!
//! A session walks `Idle -> Calibrating -> Sampling -> Completed`. Losing the
//! face (or cancelling) at any point before completion aborts the attempt:
//! every buffered sample is discarded and the session returns to `Idle`.
//! Partial windows are never estimated.
//!
//! All per-attempt state lives in [`ScanAttempt`], which is rebuilt from
//! scratch on abort so nothing leaks between attempts. A completed session is
//! not reused; callers start a new [`ScanSession`] for the next scan.
//!
//! The session is driven through `&mut self`, so concurrent ingestion into one
//! session is ruled out by the borrow checker rather than by a runtime flag.

use uuid::Uuid;

use crate::blink::BlinkDetector;
use crate::buffer::SampleBuffer;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::estimators::VitalsEstimator;
use crate::frame::FrameReading;
use crate::types::{BiometricSample, BlinkEdge, ScanState, VitalsResult};

/// Outcome of feeding one frame or sample to a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// Idle: no face yet, or face not stable for a full debounce interval
    Waiting,
    /// Face confirmed; calibration delay started
    CalibrationStarted,
    /// Still calibrating
    Calibrating,
    /// Calibration finished; this frame is the first sample
    SamplingStarted,
    /// Sample appended to the window
    SampleRecorded,
    /// Sample dropped (non-monotonic timestamp or session not sampling)
    SampleRejected,
    /// Face lost or cancelled; all buffered samples discarded
    Aborted { discarded_samples: usize },
    /// Window elapsed; vitals estimated exactly once
    Completed(VitalsResult),
    /// Session already completed; input ignored
    Ignored,
}

/// Mutable state of a single scan attempt
#[derive(Debug, Default)]
struct ScanAttempt {
    /// Source timestamp of the first face frame in the current debounce run
    face_since_ms: Option<u64>,
    calibration_start_ms: u64,
    sampling_start_ms: Option<u64>,
    last_elapsed_ms: u64,
    buffer: SampleBuffer,
    blink: BlinkDetector,
}

/// One scan attempt's lifecycle, buffer and blink counter
#[derive(Debug)]
pub struct ScanSession {
    id: Uuid,
    config: ScanConfig,
    state: ScanState,
    attempt: ScanAttempt,
    result: Option<VitalsResult>,
}

impl ScanSession {
    /// Create a session after validating its configuration
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            state: ScanState::Idle,
            attempt: ScanAttempt::default(),
            result: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Source timestamp at which sampling began, if it has
    pub fn start_timestamp(&self) -> Option<u64> {
        self.attempt.sampling_start_ms
    }

    pub fn samples(&self) -> &[BiometricSample] {
        self.attempt.buffer.samples()
    }

    pub fn blink_edge(&self) -> BlinkEdge {
        self.attempt.blink.edge()
    }

    pub fn blink_count(&self) -> u32 {
        self.attempt.blink.count()
    }

    /// Fraction of the sampling window elapsed (0-1), for progress display
    pub fn elapsed_fraction(&self) -> f64 {
        match self.state {
            ScanState::Idle | ScanState::Calibrating => 0.0,
            ScanState::Sampling => {
                (self.attempt.last_elapsed_ms as f64 / self.config.window_ms as f64).min(1.0)
            }
            ScanState::Completed => 1.0,
        }
    }

    /// Feed one tracker frame
    pub fn observe(&mut self, reading: &FrameReading) -> SessionEvent {
        if self.state == ScanState::Completed {
            return SessionEvent::Ignored;
        }

        let ts = reading.timestamp_ms;
        if reading.face.is_none() {
            if self.state == ScanState::Idle {
                self.attempt.face_since_ms = None;
                return SessionEvent::Waiting;
            }
            return self.abort("face lost");
        }

        match self.state {
            ScanState::Idle => {
                let since = *self.attempt.face_since_ms.get_or_insert(ts);
                if ts.saturating_sub(since) >= self.config.debounce_ms {
                    self.state = ScanState::Calibrating;
                    self.attempt.calibration_start_ms = ts;
                    log::debug!("scan {}: face confirmed, calibrating", self.id);
                    SessionEvent::CalibrationStarted
                } else {
                    SessionEvent::Waiting
                }
            }
            ScanState::Calibrating => {
                if ts.saturating_sub(self.attempt.calibration_start_ms) < self.config.calibration_ms {
                    return SessionEvent::Calibrating;
                }
                self.state = ScanState::Sampling;
                self.attempt.sampling_start_ms = Some(ts);
                log::debug!(
                    "scan {}: sampling for {} ms",
                    self.id,
                    self.config.window_ms
                );
                match reading.to_sample(ts) {
                    Some(sample) => match self.ingest(sample) {
                        SessionEvent::SampleRecorded => SessionEvent::SamplingStarted,
                        other => other,
                    },
                    None => SessionEvent::SampleRejected,
                }
            }
            ScanState::Sampling => {
                let start = self.attempt.sampling_start_ms.unwrap_or(ts);
                match reading.to_sample(start) {
                    Some(sample) => self.ingest(sample),
                    None => SessionEvent::SampleRejected,
                }
            }
            ScanState::Completed => SessionEvent::Ignored,
        }
    }

    /// Append a sample (timestamp relative to sampling start).
    ///
    /// Only accepted while sampling. A sample at or beyond the window end
    /// completes the session instead of being recorded.
    pub fn ingest(&mut self, sample: BiometricSample) -> SessionEvent {
        match self.state {
            ScanState::Sampling => {}
            ScanState::Completed => return SessionEvent::Ignored,
            _ => return SessionEvent::SampleRejected,
        }

        self.attempt.last_elapsed_ms = self.attempt.last_elapsed_ms.max(sample.timestamp_ms);
        if sample.timestamp_ms >= self.config.window_ms {
            return SessionEvent::Completed(self.complete());
        }

        if self.attempt.buffer.ingest(sample) {
            self.attempt.blink.observe(sample.eye_aspect_distance);
            SessionEvent::SampleRecorded
        } else {
            SessionEvent::SampleRejected
        }
    }

    /// Cancel the attempt. No-op once completed.
    pub fn cancel(&mut self) -> SessionEvent {
        if self.state == ScanState::Completed {
            return SessionEvent::Ignored;
        }
        self.abort("cancelled")
    }

    /// Vitals of a completed session
    pub fn vitals(&self) -> Result<VitalsResult, ScanError> {
        self.result
            .ok_or_else(|| ScanError::SessionNotCompleted(self.state.as_str().to_string()))
    }

    /// Take the vitals out of a completed session; `None` if not completed or
    /// already taken
    pub fn take_result(&mut self) -> Option<VitalsResult> {
        self.result.take()
    }

    fn complete(&mut self) -> VitalsResult {
        let vitals = VitalsEstimator::estimate(
            self.attempt.buffer.samples(),
            self.attempt.blink.count(),
            &self.config,
        );
        self.state = ScanState::Completed;
        self.result = Some(vitals);
        log::info!(
            "scan {} completed: {} samples, hr={} bpm, rr={} brpm, blinks={}/min, hrv={:.1} ms",
            self.id,
            self.attempt.buffer.len(),
            vitals.heart_rate_bpm,
            vitals.respiration_rate_brpm,
            vitals.blink_rate_per_min,
            vitals.hrv_ms
        );
        vitals
    }

    fn abort(&mut self, reason: &str) -> SessionEvent {
        let discarded_samples = self.attempt.buffer.len();
        if discarded_samples > 0 {
            log::warn!(
                "scan {} aborted ({}): discarding {} samples",
                self.id,
                reason,
                discarded_samples
            );
        } else {
            log::debug!("scan {} aborted ({}) in {}", self.id, reason, self.state.as_str());
        }
        self.attempt = ScanAttempt::default();
        self.state = ScanState::Idle;
        SessionEvent::Aborted { discarded_samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanProfile;
    use crate::frame::FaceMeasurements;
    use std::f64::consts::PI;

    const FRAME_MS: f64 = 1000.0 / 30.0;

    fn face(green: f64, nose: f64, eye: f64) -> FaceMeasurements {
        FaceMeasurements {
            green_channel_mean: green,
            nose_vertical_position: nose,
            eye_aspect_distance: eye,
        }
    }

    fn open_face() -> FaceMeasurements {
        face(120.0, 0.5, 0.03)
    }

    /// Drive a session from idle into sampling; returns the source timestamp
    /// of the first sample
    fn start_sampling(session: &mut ScanSession) -> u64 {
        assert_eq!(session.observe(&FrameReading::with_face(0, open_face())), SessionEvent::Waiting);
        assert_eq!(
            session.observe(&FrameReading::with_face(200, open_face())),
            SessionEvent::CalibrationStarted
        );
        assert_eq!(
            session.observe(&FrameReading::with_face(700, open_face())),
            SessionEvent::Calibrating
        );
        assert_eq!(
            session.observe(&FrameReading::with_face(1_200, open_face())),
            SessionEvent::SamplingStarted
        );
        assert_eq!(session.state(), ScanState::Sampling);
        1_200
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        assert_eq!(session.state(), ScanState::Idle);

        let start = start_sampling(&mut session);
        assert_eq!(session.start_timestamp(), Some(start));
        assert_eq!(session.samples().len(), 1);
        assert_eq!(session.samples()[0].timestamp_ms, 0);

        let event = session.observe(&FrameReading::with_face(start + 33, open_face()));
        assert_eq!(event, SessionEvent::SampleRecorded);
        assert_eq!(session.samples()[1].timestamp_ms, 33);
    }

    #[test]
    fn test_debounce_resets_on_transient_detection() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        session.observe(&FrameReading::with_face(0, open_face()));
        session.observe(&FrameReading::with_face(100, open_face()));
        assert_eq!(session.observe(&FrameReading::no_face(150)), SessionEvent::Waiting);

        // Debounce restarts from the next face frame
        assert_eq!(session.observe(&FrameReading::with_face(250, open_face())), SessionEvent::Waiting);
        assert_eq!(
            session.observe(&FrameReading::with_face(449, open_face())),
            SessionEvent::Waiting
        );
        assert_eq!(
            session.observe(&FrameReading::with_face(450, open_face())),
            SessionEvent::CalibrationStarted
        );
    }

    #[test]
    fn test_face_loss_discards_samples() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        let start = start_sampling(&mut session);
        for i in 1..=10u64 {
            let eye = if i == 5 { 0.0 } else { 0.03 };
            session.observe(&FrameReading::with_face(start + i * 33, face(120.0, 0.5, eye)));
        }
        assert_eq!(session.samples().len(), 11);
        assert_eq!(session.blink_count(), 1);

        let event = session.observe(&FrameReading::no_face(start + 400));
        assert_eq!(event, SessionEvent::Aborted { discarded_samples: 11 });
        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.samples().is_empty());
        assert_eq!(session.blink_count(), 0);
        assert_eq!(session.blink_edge(), BlinkEdge::Open);
        assert_eq!(session.start_timestamp(), None);
        assert_eq!(session.elapsed_fraction(), 0.0);
        assert!(session.vitals().is_err());
    }

    #[test]
    fn test_face_loss_during_calibration_aborts() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        session.observe(&FrameReading::with_face(0, open_face()));
        session.observe(&FrameReading::with_face(200, open_face()));
        assert_eq!(session.state(), ScanState::Calibrating);

        assert_eq!(
            session.observe(&FrameReading::no_face(300)),
            SessionEvent::Aborted { discarded_samples: 0 }
        );
        assert_eq!(session.state(), ScanState::Idle);
    }

    #[test]
    fn test_cancel() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        start_sampling(&mut session);
        assert_eq!(session.cancel(), SessionEvent::Aborted { discarded_samples: 1 });
        assert_eq!(session.state(), ScanState::Idle);
    }

    #[test]
    fn test_ingest_only_while_sampling() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        let sample = BiometricSample::new(0, 120.0, 0.5, 0.03);
        assert_eq!(session.ingest(sample), SessionEvent::SampleRejected);
        assert!(session.samples().is_empty());
    }

    #[test]
    fn test_non_monotonic_frames_rejected() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        let start = start_sampling(&mut session);
        session.observe(&FrameReading::with_face(start + 66, open_face()));
        assert_eq!(
            session.observe(&FrameReading::with_face(start + 66, open_face())),
            SessionEvent::SampleRejected
        );
        assert_eq!(
            session.observe(&FrameReading::with_face(start + 40, open_face())),
            SessionEvent::SampleRejected
        );
        assert_eq!(session.samples().len(), 2);
    }

    #[test]
    fn test_progress_and_single_completion() {
        let config = ScanProfile::HeartRateOnly.config();
        let mut session = ScanSession::new(config).unwrap();
        let start = start_sampling(&mut session);

        session.observe(&FrameReading::with_face(start + 3_000, open_face()));
        assert!((session.elapsed_fraction() - 0.5).abs() < 1e-9);

        let event = session.observe(&FrameReading::with_face(start + 6_000, open_face()));
        let vitals = match event {
            SessionEvent::Completed(v) => v,
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(session.state(), ScanState::Completed);
        assert_eq!(session.elapsed_fraction(), 1.0);
        // Two samples only: every estimator falls back
        assert_eq!(vitals.heart_rate_bpm, 72);
        assert_eq!(vitals.respiration_rate_brpm, 16);
        assert_eq!(vitals.hrv_ms, 45.0);

        // Terminal: further frames, face loss and cancel are ignored
        assert_eq!(
            session.observe(&FrameReading::with_face(start + 6_033, open_face())),
            SessionEvent::Ignored
        );
        assert_eq!(session.observe(&FrameReading::no_face(start + 6_066)), SessionEvent::Ignored);
        assert_eq!(session.cancel(), SessionEvent::Ignored);

        assert_eq!(session.vitals().unwrap(), vitals);
        assert_eq!(session.take_result(), Some(vitals));
        assert_eq!(session.take_result(), None);
    }

    #[test]
    fn test_end_to_end_synthetic_pulse() {
        let mut session = ScanSession::new(ScanConfig::default()).unwrap();
        let start = start_sampling(&mut session);

        let mut completed = None;
        let mut k = 1u64;
        while completed.is_none() {
            let offset = (k as f64 * FRAME_MS).round() as u64;
            let t = offset as f64 / 1000.0;
            let green = 120.0 + 2.0 * (2.0 * PI * 1.2 * t).sin() + 0.5 * t;
            let nose = 0.5 + 0.01 * (2.0 * PI * 0.25 * t).sin();
            // Eyes closed for three frames at 2 s, 6 s, 10 s and 14 s
            let eye = if (2_000..2_100).contains(&(offset % 4_000)) { 0.005 } else { 0.03 };
            if let SessionEvent::Completed(v) =
                session.observe(&FrameReading::with_face(start + offset, face(green, nose, eye)))
            {
                completed = Some(v);
            }
            k += 1;
        }

        let vitals = completed.unwrap();
        assert_eq!(session.samples().len(), 450);
        assert!(ScanConfig::default().heart_rate_clamp.contains(vitals.heart_rate_bpm));
        assert!(
            (62..=82).contains(&vitals.heart_rate_bpm),
            "hr = {}",
            vitals.heart_rate_bpm
        );
        assert!((12..=18).contains(&vitals.respiration_rate_brpm));
        assert_eq!(session.blink_count(), 4);
        assert_eq!(vitals.blink_rate_per_min, 16);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScanConfig { window_ms: 0, ..ScanConfig::default() };
        assert!(ScanSession::new(config).is_err());
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        let a = ScanSession::new(ScanConfig::default()).unwrap();
        let b = ScanSession::new(ScanConfig::default()).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
