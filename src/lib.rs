//! BioScan Vitals - camera-based vital sign estimation over facial landmark time series
//!
//! A scan session turns per-frame readings (forehead green-channel mean, nose
//! position, eyelid separation) into heart rate, respiration rate, blink rate
//! and an HRV proxy through a deterministic pipeline: frame extraction →
//! session state machine → signal conditioning → vital estimation → report
//! encoding.
//!
//! ## Modules
//!
//! - **Scan Pipeline**: Drive a [`ScanSession`] from a frame source and estimate vitals
//! - **History**: Rank wellness outcomes against a bounded, file-backed [`HistoryLedger`]

pub mod blink;
pub mod buffer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod estimators;
pub mod frame;
pub mod history;
pub mod ledger;
pub mod pipeline;
pub mod ranker;
pub mod session;
pub mod signal;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{ClampRange, ScanConfig, ScanProfile};
pub use error::ScanError;
pub use frame::{FaceLandmarks, FaceMeasurements, FrameReading, PixelRegionSampler, RgbFrame};
pub use history::HistoryStore;
pub use ledger::HistoryLedger;
pub use pipeline::{estimate_vitals, BioScanProcessor};
pub use ranker::{age_bucket_for_age, age_bucket_from_estimate, PercentileRanker};
pub use session::{ScanSession, SessionEvent};
pub use types::{
    BiometricSample, PercentileResult, ScanState, VitalsResult, WellnessIndex, WellnessReport,
};

/// Library version embedded in all report payloads
pub const BIOSCAN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report payloads
pub const PRODUCER_NAME: &str = "bioscan-vitals";
