//! Frame source interface
//!
//! The external tracker delivers a timestamp, an optional landmark set and a
//! way to sample pixels. This module reduces that to a [`FrameReading`]: the
//! three scalar measurements a scan session records per frame.

use serde::{Deserialize, Serialize};

use crate::types::BiometricSample;

/// Side length of the square forehead region sampled for the pulse signal (px)
pub const FOREHEAD_REGION_SIZE_PX: u32 = 20;

/// Landmark position in normalized image coordinates (0-1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The subset of tracker landmarks the vitals pipeline needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub forehead: Point,
    pub nose_tip: Point,
    pub upper_eyelid: Point,
    pub lower_eyelid: Point,
}

impl FaceLandmarks {
    /// Vertical eyelid separation in normalized units
    pub fn eye_aspect_distance(&self) -> f64 {
        (self.lower_eyelid.y - self.upper_eyelid.y).abs()
    }
}

/// Square pixel region centered on a normalized point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub center: Point,
    pub size_px: u32,
}

/// Pixel access supplied by the frame source
pub trait PixelRegionSampler {
    /// Mean green intensity (0-255) over the region, `None` if it lies off-frame
    fn mean_green(&self, region: Region) -> Option<f64>;
}

/// Interleaved RGB8 frame
#[derive(Debug, Clone, Copy)]
pub struct RgbFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

impl<'a> RgbFrame<'a> {
    /// Wrap a buffer of `width * height * 3` bytes; `None` on size mismatch
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self { width, height, data })
    }
}

impl PixelRegionSampler for RgbFrame<'_> {
    fn mean_green(&self, region: Region) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if !region.center.x.is_finite() || !region.center.y.is_finite() {
            return None;
        }
        // Float to int casts saturate; keep the corner arithmetic saturating too
        let cx = (region.center.x * self.width as f64).round() as i64;
        let cy = (region.center.y * self.height as f64).round() as i64;
        let half = i64::from(region.size_px / 2);
        let size = i64::from(region.size_px);

        let left = cx.saturating_sub(half);
        let top = cy.saturating_sub(half);
        let x0 = left.max(0);
        let y0 = top.max(0);
        let x1 = left.saturating_add(size).min(i64::from(self.width));
        let y1 = top.saturating_add(size).min(i64::from(self.height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        let mut sum = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                let idx = (y as usize * self.width as usize + x as usize) * 3 + 1;
                sum += u64::from(*self.data.get(idx)?);
            }
        }
        let count = ((x1 - x0) * (y1 - y0)) as f64;
        Some(sum as f64 / count)
    }
}

/// Per-frame measurements for a tracked face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMeasurements {
    pub green_channel_mean: f64,
    pub nose_vertical_position: f64,
    pub eye_aspect_distance: f64,
}

/// One tracker frame, reduced to what a scan session consumes.
///
/// `face == None` means the tracker lost the subject on this frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameReading {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub face: Option<FaceMeasurements>,
}

impl FrameReading {
    pub fn with_face(timestamp_ms: u64, face: FaceMeasurements) -> Self {
        Self { timestamp_ms, face: Some(face) }
    }

    pub fn no_face(timestamp_ms: u64) -> Self {
        Self { timestamp_ms, face: None }
    }

    /// Reduce a raw tracker frame. A forehead region that falls off-frame
    /// cannot be sampled and counts as a lost face.
    pub fn from_frame(
        timestamp_ms: u64,
        landmarks: Option<&FaceLandmarks>,
        sampler: &dyn PixelRegionSampler,
    ) -> Self {
        let face = landmarks.and_then(|lm| {
            let green = sampler.mean_green(Region {
                center: lm.forehead,
                size_px: FOREHEAD_REGION_SIZE_PX,
            })?;
            Some(FaceMeasurements {
                green_channel_mean: green,
                nose_vertical_position: lm.nose_tip.y.clamp(0.0, 1.0),
                eye_aspect_distance: lm.eye_aspect_distance(),
            })
        });
        Self { timestamp_ms, face }
    }

    /// Sample for this frame, timestamped relative to the sampling start
    pub fn to_sample(&self, sampling_start_ms: u64) -> Option<BiometricSample> {
        self.face.map(|f| {
            BiometricSample::new(
                self.timestamp_ms.saturating_sub(sampling_start_ms),
                f.green_channel_mean,
                f.nose_vertical_position,
                f.eye_aspect_distance,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, green: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[10, green, 30]);
        }
        data
    }

    fn landmarks() -> FaceLandmarks {
        FaceLandmarks {
            forehead: Point::new(0.5, 0.2),
            nose_tip: Point::new(0.5, 0.55),
            upper_eyelid: Point::new(0.4, 0.40),
            lower_eyelid: Point::new(0.4, 0.43),
        }
    }

    #[test]
    fn test_rgb_frame_size_check() {
        let data = solid_frame(4, 4, 0);
        assert!(RgbFrame::new(4, 4, &data).is_some());
        assert!(RgbFrame::new(5, 4, &data).is_none());
    }

    #[test]
    fn test_mean_green_reads_green_channel() {
        let data = solid_frame(64, 48, 137);
        let frame = RgbFrame::new(64, 48, &data).unwrap();
        let mean = frame
            .mean_green(Region { center: Point::new(0.5, 0.5), size_px: FOREHEAD_REGION_SIZE_PX })
            .unwrap();
        assert!((mean - 137.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_green_clips_to_frame() {
        let width = 10;
        let mut data = solid_frame(width, 10, 0);
        // Top-left pixel bright green
        data[1] = 200;
        let frame = RgbFrame::new(width, 10, &data).unwrap();

        // Region centered on the corner keeps only the in-frame quadrant (2x2 px)
        let mean = frame
            .mean_green(Region { center: Point::new(0.0, 0.0), size_px: 4 })
            .unwrap();
        assert!((mean - 50.0).abs() < 1e-9);

        assert!(frame
            .mean_green(Region { center: Point::new(3.0, 3.0), size_px: 4 })
            .is_none());
    }

    #[test]
    fn test_mean_green_far_or_non_finite_center() {
        let data = solid_frame(10, 10, 80);
        let frame = RgbFrame::new(10, 10, &data).unwrap();

        for center in [
            Point::new(1e30, 0.5),
            Point::new(0.5, -1e30),
            Point::new(f64::NAN, 0.5),
            Point::new(0.5, f64::INFINITY),
        ] {
            assert!(frame.mean_green(Region { center, size_px: u32::MAX }).is_none());
        }
        assert!(frame
            .mean_green(Region { center: Point::new(0.5, 0.5), size_px: u32::MAX })
            .is_some());
    }

    #[test]
    fn test_from_frame() {
        let data = solid_frame(64, 48, 90);
        let frame = RgbFrame::new(64, 48, &data).unwrap();
        let lm = landmarks();

        let reading = FrameReading::from_frame(500, Some(&lm), &frame);
        let face = reading.face.unwrap();
        assert!((face.green_channel_mean - 90.0).abs() < 1e-9);
        assert!((face.nose_vertical_position - 0.55).abs() < 1e-9);
        assert!((face.eye_aspect_distance - 0.03).abs() < 1e-9);

        let lost = FrameReading::from_frame(533, None, &frame);
        assert!(lost.face.is_none());
    }

    #[test]
    fn test_to_sample_is_relative() {
        let reading = FrameReading::with_face(
            1_700,
            FaceMeasurements {
                green_channel_mean: 100.0,
                nose_vertical_position: 0.5,
                eye_aspect_distance: 0.02,
            },
        );
        assert_eq!(reading.to_sample(1_200).unwrap().timestamp_ms, 500);
        assert!(FrameReading::no_face(10).to_sample(0).is_none());
    }

    #[test]
    fn test_reading_json_without_face() {
        let reading: FrameReading = serde_json::from_str(r#"{"timestamp_ms": 42}"#).unwrap();
        assert_eq!(reading, FrameReading::no_face(42));
    }
}
