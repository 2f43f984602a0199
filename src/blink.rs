//! Blink detection
//!
//! Two-state eyelid edge machine: a blink is counted once per open to closed
//! transition, so a run of closed frames is a single blink.

use crate::types::BlinkEdge;

/// Eyelid separation below which the eye is considered closed
pub const BLINK_CLOSED_THRESHOLD: f64 = 0.015;

/// Incremental blink counter for one scan attempt
#[derive(Debug, Clone, Default)]
pub struct BlinkDetector {
    edge: BlinkEdge,
    count: u32,
}

impl BlinkDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one eyelid separation reading. Returns `true` when it starts a blink.
    pub fn observe(&mut self, eye_aspect_distance: f64) -> bool {
        if eye_aspect_distance < BLINK_CLOSED_THRESHOLD {
            if self.edge == BlinkEdge::Open {
                self.edge = BlinkEdge::Closed;
                self.count += 1;
                return true;
            }
        } else {
            self.edge = BlinkEdge::Open;
        }
        false
    }

    pub fn edge(&self) -> BlinkEdge {
        self.edge
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
