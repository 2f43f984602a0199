//! Vital sign estimation
//!
//! Derives heart rate, respiration rate, blink rate and an HRV proxy from the
//! samples of a completed scan window. Every estimator degrades to a resting
//! state constant when the window holds too little data.

use crate::config::ScanConfig;
use crate::signal::{detrend, local_maxima, mean_crossings, population_std_dev, DETREND_HALF_WINDOW};
use crate::types::{BiometricSample, VitalsResult};

/// Minimum samples for a heart-rate estimate
pub const MIN_HEART_RATE_SAMPLES: usize = 20;
/// Minimum samples for a respiration estimate
pub const MIN_RESPIRATION_SAMPLES: usize = 50;
/// Minimum detected pulse peaks for an HRV estimate
pub const MIN_HRV_PEAKS: usize = 5;

/// Heart rate reported when the window is too short (BPM)
pub const FALLBACK_HEART_RATE_BPM: u32 = 72;
/// Respiration rate reported when the window is too short (breaths/min)
pub const FALLBACK_RESPIRATION_BRPM: u32 = 16;
/// HRV proxy reported when too few peaks are found (ms)
pub const FALLBACK_HRV_MS: f64 = 45.0;

/// Estimator for the four vitals of a scan window
pub struct VitalsEstimator;

impl VitalsEstimator {
    /// Estimate all vitals. `blink_count` is the count accumulated while sampling.
    pub fn estimate(
        samples: &[BiometricSample],
        blink_count: u32,
        config: &ScanConfig,
    ) -> VitalsResult {
        let window_seconds = config.window_seconds();

        VitalsResult {
            heart_rate_bpm: estimate_heart_rate(samples, config),
            respiration_rate_brpm: estimate_respiration_rate(samples, window_seconds),
            blink_rate_per_min: blink_rate(blink_count, window_seconds),
            hrv_ms: estimate_hrv(samples),
        }
    }
}

/// Per-minute rate of `count` events observed over `window_seconds`
fn per_minute(count: f64, window_seconds: f64) -> u32 {
    if window_seconds <= 0.0 {
        return 0;
    }
    (count / window_seconds * 60.0).round().max(0.0) as u32
}

/// Indices (into `samples`) of pulse peaks in the detrended green channel
pub fn pulse_peaks(samples: &[BiometricSample]) -> Vec<usize> {
    let green: Vec<f64> = samples.iter().map(|s| s.green_channel_mean).collect();
    let detrended = detrend(&green, DETREND_HALF_WINDOW);
    // Detrended index i corresponds to sample i + w
    local_maxima(&detrended)
        .into_iter()
        .map(|i| i + DETREND_HALF_WINDOW)
        .collect()
}

/// Heart rate from peak counting on the detrended green channel.
///
/// Formula: `round(peaks / window_seconds * 60)`, clamped to the configured range
pub fn estimate_heart_rate(samples: &[BiometricSample], config: &ScanConfig) -> u32 {
    if samples.len() < MIN_HEART_RATE_SAMPLES {
        return FALLBACK_HEART_RATE_BPM;
    }
    let peaks = pulse_peaks(samples).len();
    let bpm = per_minute(peaks as f64, config.window_seconds());
    config.heart_rate_clamp.clamp(bpm)
}

/// Respiration rate from mean crossings of the raw nose-position series.
///
/// Formula: `round(crossings / 2 / window_seconds * 60)`; a full breath crosses twice
pub fn estimate_respiration_rate(samples: &[BiometricSample], window_seconds: f64) -> u32 {
    if samples.len() < MIN_RESPIRATION_SAMPLES {
        return FALLBACK_RESPIRATION_BRPM;
    }
    let nose: Vec<f64> = samples.iter().map(|s| s.nose_vertical_position).collect();
    let crossings = mean_crossings(&nose);
    per_minute(crossings as f64 / 2.0, window_seconds)
}

/// Blink rate from the count accumulated during sampling
pub fn blink_rate(blink_count: u32, window_seconds: f64) -> u32 {
    per_minute(blink_count as f64, window_seconds)
}

/// HRV proxy: population standard deviation of inter-peak intervals (ms).
///
/// Not a clinical HRV metric; there is no R-R detection behind it.
pub fn estimate_hrv(samples: &[BiometricSample]) -> f64 {
    let peaks = pulse_peaks(samples);
    if peaks.len() < MIN_HRV_PEAKS {
        return FALLBACK_HRV_MS;
    }

    let intervals: Vec<f64> = peaks
        .windows(2)
        .map(|pair| samples[pair[1]].timestamp_ms.abs_diff(samples[pair[0]].timestamp_ms) as f64)
        .collect();

    population_std_dev(&intervals).unwrap_or(FALLBACK_HRV_MS)
}
