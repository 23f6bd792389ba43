//! Tracker configuration
//!
//! Detection thresholds, per-step estimation constants and engine tunables.
//! Every field has a default, so a partial JSON file only overrides what it names.

use crate::error::TrackerError;
use crate::types::DEFAULT_DAILY_GOAL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Immutable engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum linear acceleration magnitude for a step (m/s²)
    pub step_threshold: f32,
    /// Refractory period between two detected steps
    pub min_step_interval_ms: i64,
    /// Calories burned per step (kcal)
    pub calories_per_step: f32,
    /// Stride length (m)
    pub stride_length_m: f32,
    /// Hardware deltas above this are treated as a counter reset
    pub hardware_reset_jump_threshold: u32,
    /// Gravity low-pass smoothing factor
    pub gravity_alpha: f32,
    /// Goal for installs that have never set one
    pub default_daily_goal: u32,
    /// Persist after this many applied step events
    pub flush_every_events: u32,
    /// Per-subscriber queue depth before updates are dropped
    pub subscriber_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            step_threshold: 12.0,
            min_step_interval_ms: 250,
            calories_per_step: 0.04,
            stride_length_m: 0.75,
            hardware_reset_jump_threshold: 1000,
            gravity_alpha: 0.8,
            default_daily_goal: DEFAULT_DAILY_GOAL,
            flush_every_events: 20,
            subscriber_buffer: 16,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, TrackerError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        check_non_negative("step_threshold", self.step_threshold)?;
        check_non_negative("calories_per_step", self.calories_per_step)?;
        check_non_negative("stride_length_m", self.stride_length_m)?;

        if self.min_step_interval_ms < 0 {
            return Err(TrackerError::InvalidConfig(format!(
                "min_step_interval_ms must not be negative, got {}",
                self.min_step_interval_ms
            )));
        }
        if !(0.0..1.0).contains(&self.gravity_alpha) {
            return Err(TrackerError::InvalidConfig(format!(
                "gravity_alpha must be in [0, 1), got {}",
                self.gravity_alpha
            )));
        }
        if self.flush_every_events == 0 {
            return Err(TrackerError::InvalidConfig(
                "flush_every_events must be at least 1".to_string(),
            ));
        }
        if self.subscriber_buffer == 0 {
            return Err(TrackerError::InvalidConfig(
                "subscriber_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_non_negative(name: &str, value: f32) -> Result<(), TrackerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrackerError::InvalidConfig(format!(
            "{} must be a finite non-negative number, got {}",
            name, value
        )))
    }
}
