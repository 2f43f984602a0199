//! Scan configuration
//!
//! Window length, heart-rate clamp range and the tracker timing constants.
//! Different deployments clamp heart rate differently, so the range is a
//! parameter rather than a constant.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Default scan window (ms)
pub const DEFAULT_WINDOW_MS: u64 = 15_000;

/// Window for heart-rate-only scans (ms)
pub const HEART_RATE_ONLY_WINDOW_MS: u64 = 6_000;

/// Face must be continuously present this long before calibrating (ms)
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Exposure/autofocus settle time before sampling (ms)
pub const DEFAULT_CALIBRATION_MS: u64 = 1_000;

/// Inclusive clamp range for heart-rate estimates (BPM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampRange {
    pub min_bpm: u32,
    pub max_bpm: u32,
}

impl ClampRange {
    pub const STANDARD: ClampRange = ClampRange { min_bpm: 50, max_bpm: 110 };
    pub const HEART_RATE_ONLY: ClampRange = ClampRange { min_bpm: 55, max_bpm: 100 };

    pub fn new(min_bpm: u32, max_bpm: u32) -> Self {
        Self { min_bpm, max_bpm }
    }

    pub fn clamp(&self, bpm: u32) -> u32 {
        bpm.clamp(self.min_bpm, self.max_bpm)
    }

    pub fn contains(&self, bpm: u32) -> bool {
        (self.min_bpm..=self.max_bpm).contains(&bpm)
    }
}

/// Named scan profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanProfile {
    /// Full vitals scan: 15 s window, heart rate clamped to [50, 110]
    Standard,
    /// Short heart-rate scan: 6 s window, heart rate clamped to [55, 100]
    HeartRateOnly,
}

impl ScanProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanProfile::Standard => "standard",
            ScanProfile::HeartRateOnly => "heart_rate_only",
        }
    }

    pub fn config(&self) -> ScanConfig {
        match self {
            ScanProfile::Standard => ScanConfig::default(),
            ScanProfile::HeartRateOnly => ScanConfig {
                window_ms: HEART_RATE_ONLY_WINDOW_MS,
                heart_rate_clamp: ClampRange::HEART_RATE_ONLY,
                ..ScanConfig::default()
            },
        }
    }
}

/// Configuration for a scan session and its estimators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Sampling window length (ms)
    pub window_ms: u64,
    /// Heart-rate clamp range
    pub heart_rate_clamp: ClampRange,
    /// Face debounce interval (ms)
    pub debounce_ms: u64,
    /// Calibration delay (ms)
    pub calibration_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            heart_rate_clamp: ClampRange::STANDARD,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            calibration_ms: DEFAULT_CALIBRATION_MS,
        }
    }
}

impl ScanConfig {
    /// Window length in seconds, as used by the rate estimators
    pub fn window_seconds(&self) -> f64 {
        self.window_ms as f64 / 1000.0
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.window_ms == 0 {
            return Err(ScanError::InvalidConfig(
                "window_ms must be greater than zero".to_string(),
            ));
        }
        if self.heart_rate_clamp.min_bpm > self.heart_rate_clamp.max_bpm {
            return Err(ScanError::InvalidConfig(format!(
                "heart rate clamp is inverted: [{}, {}]",
                self.heart_rate_clamp.min_bpm, self.heart_rate_clamp.max_bpm
            )));
        }
        Ok(())
    }

    /// Load and validate a config from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
