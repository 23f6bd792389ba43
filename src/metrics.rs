//! Calorie and distance estimation
//!
//! Fixed per-step constants; no profile-based stride or weight adjustment.

use crate::config::TrackerConfig;

/// Calories and distance for a batch of steps
pub fn estimate(delta_steps: u32, config: &TrackerConfig) -> (f32, f32) {
    let steps = delta_steps as f32;
    (steps * config.calories_per_step, steps * config.stride_length_m)
}
