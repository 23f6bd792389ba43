//! Motion filtering
//!
//! Separates gravity from linear acceleration with a per-axis exponential
//! low-pass filter, then reports the magnitude of what is left.

use crate::types::{FilterState, MotionSample};

/// Default gravity smoothing factor
pub const DEFAULT_ALPHA: f32 = 0.8;

/// Gravity/linear acceleration separator
#[derive(Debug, Clone, Copy)]
pub struct MotionFilter {
    alpha: f32,
}

impl Default for MotionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl MotionFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    /// Feed one sample and return the linear-acceleration magnitude.
    ///
    /// `gravity' = α·gravity + (1-α)·raw`, `linear = raw - gravity'`.
    pub fn apply(&self, sample: &MotionSample, state: &mut FilterState) -> f32 {
        let raw = sample.axes();
        for axis in 0..3 {
            state.gravity[axis] = self.alpha * state.gravity[axis] + (1.0 - self.alpha) * raw[axis];
            state.linear[axis] = raw[axis] - state.gravity[axis];
        }
        magnitude(&state.linear)
    }
}

fn magnitude(v: &[f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
