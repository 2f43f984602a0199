//! Sample buffer
//!
//! Ordered, strictly time-monotonic storage for the samples of one scan window.
//! The owning session decides when ingestion is allowed; the buffer only
//! enforces ordering.

use crate::types::BiometricSample;

/// Ordered per-frame samples for a single scan attempt
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: Vec<BiometricSample>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. Returns `false` (and stores nothing) when its timestamp
    /// does not strictly follow the last stored sample.
    pub fn ingest(&mut self, sample: BiometricSample) -> bool {
        if let Some(last) = self.samples.last() {
            if sample.timestamp_ms <= last.timestamp_ms {
                return false;
            }
        }
        self.samples.push(sample);
        true
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[BiometricSample] {
        &self.samples
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.timestamp_ms).collect()
    }

    pub fn green_series(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.green_channel_mean).collect()
    }

    pub fn nose_series(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.nose_vertical_position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: u64) -> BiometricSample {
        BiometricSample::new(ts, 100.0, 0.5, 0.03)
    }

    #[test]
    fn test_rejects_non_monotonic() {
        let mut buffer = SampleBuffer::new();
        assert!(buffer.ingest(sample(0)));
        assert!(buffer.ingest(sample(33)));
        assert!(!buffer.ingest(sample(33)));
        assert!(!buffer.ingest(sample(20)));
        assert!(buffer.ingest(sample(66)));
        assert_eq!(buffer.timestamps(), vec![0, 33, 66]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = SampleBuffer::new();
        buffer.ingest(sample(0));
        buffer.ingest(sample(10));
        buffer.clear();
        assert!(buffer.is_empty());
        // Ordering restarts after a clear
        assert!(buffer.ingest(sample(5)));
    }

    #[test]
    fn test_series_extraction() {
        let mut buffer = SampleBuffer::new();
        buffer.ingest(BiometricSample::new(0, 101.0, 0.40, 0.03));
        buffer.ingest(BiometricSample::new(33, 102.5, 0.42, 0.01));
        assert_eq!(buffer.green_series(), vec![101.0, 102.5]);
        assert_eq!(buffer.nose_series(), vec![0.40, 0.42]);
    }
}
