//! Step event detection
//!
//! Thresholds the filtered acceleration magnitude and enforces a refractory
//! window between steps. There is no gait pattern matching beyond that window,
//! so a sharp non-walking jolt above the threshold still counts as one step.

use crate::config::TrackerConfig;
use crate::types::StepEvent;

/// Cursor value meaning "no step detected yet"
pub const NO_PREVIOUS_STEP: i64 = i64::MIN;

/// Emit one step when `magnitude > step_threshold` and more than
/// `min_step_interval_ms` has passed since `last_step_time`.
///
/// The cursor only moves when a step is emitted.
pub fn detect(
    magnitude: f32,
    now: i64,
    last_step_time: &mut i64,
    config: &TrackerConfig,
) -> Option<StepEvent> {
    if magnitude <= config.step_threshold {
        return None;
    }

    if now.saturating_sub(*last_step_time) <= config.min_step_interval_ms {
        return None;
    }

    *last_step_time = now;
    Some(StepEvent {
        timestamp: now,
        count: 1,
    })
}

/// Detector that owns its refractory cursor
#[derive(Debug, Clone)]
pub struct StepDetector {
    last_step_time: i64,
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StepDetector {
    pub fn new() -> Self {
        Self {
            last_step_time: NO_PREVIOUS_STEP,
        }
    }

    pub fn detect(
        &mut self,
        magnitude: f32,
        now: i64,
        config: &TrackerConfig,
    ) -> Option<StepEvent> {
        detect(magnitude, now, &mut self.last_step_time, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> TrackerConfig {
        TrackerConfig {
            step_threshold: 12.0,
            min_step_interval_ms: 250,
            ..Default::default()
        }
    }

    #[test]
    fn test_refractory_window_scenario() {
        let config = config();
        let mut detector = StepDetector::new();

        let events: Vec<StepEvent> = [(5.0, 0), (15.0, 100), (4.0, 150), (16.0, 200)]
            .iter()
            .filter_map(|&(magnitude, t)| detector.detect(magnitude, t, &config))
            .collect();

        assert_eq!(
            events,
            vec![StepEvent {
                timestamp: 100,
                count: 1
            }]
        );
        assert_eq!(detector.last_step_time, 100);
    }

    #[test]
    fn test_threshold_is_strict() {
        let config = config();
        let mut last = NO_PREVIOUS_STEP;
        assert!(detect(12.0, 1_000, &mut last, &config).is_none());
        assert_eq!(last, NO_PREVIOUS_STEP);
        assert!(detect(12.01, 1_000, &mut last, &config).is_some());
    }

    #[test]
    fn test_interval_is_strict() {
        let config = config();
        let mut last = 1_000;
        assert!(detect(20.0, 1_250, &mut last, &config).is_none());
        assert_eq!(last, 1_000);
        assert!(detect(20.0, 1_251, &mut last, &config).is_some());
        assert_eq!(last, 1_251);
    }

    #[test]
    fn test_steady_walk_counts_each_step() {
        let config = config();
        let mut detector = StepDetector::new();

        let steps = (0..10)
            .filter_map(|i| detector.detect(14.0, i * 500, &config))
            .count();

        assert_eq!(steps, 10);
    }

    #[test]
    fn test_backward_time_is_rejected() {
        let config = config();
        let mut last = 10_000;
        assert!(detect(20.0, 5_000, &mut last, &config).is_none());
        assert_eq!(last, 10_000);
    }
}
