//! Hardware step counter reconciliation
//!
//! Platform pedometers report an absolute count that only resets when the
//! device reboots. This module turns successive readings into accepted deltas.
//! A reading below the previous one, or a jump above the configured threshold,
//! is treated as a counter reset: the baseline moves to the new reading and
//! nothing is credited. A genuinely long unobserved walk is dropped the same
//! way; that loss is preferred over crediting thousands of phantom steps.

use crate::config::TrackerConfig;

/// How a single reading was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// First reading since (re)arming; baseline set, nothing credited
    Seeded { baseline: u32 },
    /// Plausible increment (may be 0)
    Accepted { delta: u32 },
    /// Counter went backwards, usually a reboot
    CounterReset { previous: u32, raw: u32 },
    /// Increment larger than the jump threshold
    ImplausibleJump { previous: u32, raw: u32 },
}

impl Reconciliation {
    /// Steps to credit for this reading
    pub fn delta(&self) -> u32 {
        match self {
            Reconciliation::Accepted { delta } => *delta,
            _ => 0,
        }
    }
}

/// Tracks whether a baseline has been taken since the last (re)arm.
///
/// The previous reading itself lives in the persisted snapshot, so it is passed
/// in rather than owned here.
#[derive(Debug, Clone, Default)]
pub struct HardwareReconciler {
    seeded: bool,
}

impl HardwareReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the baseline so the next reading seeds a new one
    pub fn rearm(&mut self) {
        self.seeded = false;
    }

    pub fn reconcile(
        &mut self,
        raw: u32,
        prev: &mut u32,
        config: &TrackerConfig,
    ) -> Reconciliation {
        if !self.seeded {
            self.seeded = true;
            *prev = raw;
            return Reconciliation::Seeded { baseline: raw };
        }

        let previous = *prev;
        *prev = raw;

        if raw < previous {
            log::info!(
                "Hardware step counter went backwards ({} -> {}), re-baselining",
                previous,
                raw
            );
            return Reconciliation::CounterReset { previous, raw };
        }

        let delta = raw - previous;
        if delta > config.hardware_reset_jump_threshold {
            log::info!(
                "Large step delta detected ({}), possibly from reboot; re-baselining",
                delta
            );
            return Reconciliation::ImplausibleJump { previous, raw };
        }

        Reconciliation::Accepted { delta }
    }
}

/// Convert an absolute reading into an accepted delta using `prev == 0` as the
/// "no baseline yet" marker.
///
/// Convenience form for callers that have no reconciler state of their own.
/// A genuine reading of 0 cannot be told apart from a missing baseline here,
/// so the engine uses [`HardwareReconciler`] instead.
pub fn reconcile(raw: u32, prev: &mut u32, config: &TrackerConfig) -> u32 {
    let mut reconciler = HardwareReconciler { seeded: *prev != 0 };
    reconciler.reconcile(raw, prev, config).delta()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn config(threshold: u32) -> TrackerConfig {
        TrackerConfig {
            hardware_reset_jump_threshold: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_reading_seeds_baseline() {
        let config = config(1000);
        let mut reconciler = HardwareReconciler::new();
        let mut prev = 0;

        let result = reconciler.reconcile(4_321, &mut prev, &config);

        assert_eq!(result, Reconciliation::Seeded { baseline: 4_321 });
        assert_eq!(result.delta(), 0);
        assert_eq!(prev, 4_321);
    }

    #[test]
    fn test_zero_baseline_then_increments() {
        let config = config(500);
        let mut reconciler = HardwareReconciler::new();
        let mut prev = 0;

        let deltas: Vec<u32> = [0, 100, 150]
            .iter()
            .map(|&raw| reconciler.reconcile(raw, &mut prev, &config).delta())
            .collect();

        assert_eq!(deltas, vec![0, 100, 50]);
        assert_eq!(prev, 150);
    }

    #[test]
    fn test_sum_of_deltas_matches_span() {
        let config = config(1000);
        let mut reconciler = HardwareReconciler::new();
        let mut prev = 0;
        let readings = [2_000, 2_010, 2_010, 2_500, 3_400, 3_401];

        let total: u32 = readings
            .iter()
            .map(|&raw| reconciler.reconcile(raw, &mut prev, &config).delta())
            .sum();

        assert_eq!(total, 3_401 - 2_000);
    }

    #[test]
    fn test_backwards_reading_rebaselines() {
        let config = config(1000);
        let mut reconciler = HardwareReconciler::new();
        let mut prev = 0;
        reconciler.reconcile(8_000, &mut prev, &config);

        let result = reconciler.reconcile(12, &mut prev, &config);

        assert_eq!(
            result,
            Reconciliation::CounterReset {
                previous: 8_000,
                raw: 12
            }
        );
        assert_eq!(result.delta(), 0);
        assert_eq!(prev, 12);

        // Counting resumes from the new baseline
        assert_eq!(reconciler.reconcile(40, &mut prev, &config).delta(), 28);
    }

    #[test]
    fn test_large_jump_rebaselines() {
        let config = config(1000);
        let mut reconciler = HardwareReconciler::new();
        let mut prev = 0;
        reconciler.reconcile(100, &mut prev, &config);

        let result = reconciler.reconcile(1_101, &mut prev, &config);

        assert_eq!(
            result,
            Reconciliation::ImplausibleJump {
                previous: 100,
                raw: 1_101
            }
        );
        assert_eq!(result.delta(), 0);
        assert_eq!(prev, 1_101);
    }

    #[test]
    fn test_jump_at_threshold_is_accepted() {
        let config = config(1000);
        let mut reconciler = HardwareReconciler::new();
        let mut prev = 0;
        reconciler.reconcile(100, &mut prev, &config);

        assert_eq!(reconciler.reconcile(1_100, &mut prev, &config).delta(), 1000);
    }

    #[test]
    fn test_rearm_forgets_baseline() {
        let config = config(1000);
        let mut reconciler = HardwareReconciler::new();
        let mut prev = 0;
        reconciler.reconcile(100, &mut prev, &config);
        reconciler.rearm();

        let result = reconciler.reconcile(300, &mut prev, &config);

        assert_eq!(result, Reconciliation::Seeded { baseline: 300 });
        assert_eq!(prev, 300);
    }

    #[test]
    fn test_free_function_uses_zero_as_unseeded() {
        let config = config(1000);
        let mut prev = 0;

        assert_eq!(reconcile(500, &mut prev, &config), 0);
        assert_eq!(prev, 500);
        assert_eq!(reconcile(520, &mut prev, &config), 20);
        assert_eq!(reconcile(5_000, &mut prev, &config), 0);
        assert_eq!(prev, 5_000);
    }

    proptest! {
        #[test]
        fn test_plausible_sequence_credits_full_span(
            baseline in 0u32..1_000_000_000,
            increments in prop::collection::vec(0u32..=1_000, 0..64),
        ) {
            let config = config(1000);
            let mut reconciler = HardwareReconciler::new();
            let mut prev = 0;

            prop_assert_eq!(
                reconciler.reconcile(baseline, &mut prev, &config),
                Reconciliation::Seeded { baseline }
            );

            let mut raw = baseline;
            let mut credited = 0u32;
            for increment in increments {
                raw += increment;
                let result = reconciler.reconcile(raw, &mut prev, &config);
                prop_assert_eq!(result, Reconciliation::Accepted { delta: increment });
                credited += result.delta();
            }

            prop_assert_eq!(credited, raw - baseline);
            prop_assert_eq!(prev, raw);
        }

        #[test]
        fn test_decrease_or_jump_always_rebaselines(
            first in any::<u32>(),
            readings in prop::collection::vec(any::<u32>(), 1..64),
            threshold in 1u32..5_000,
        ) {
            let config = config(threshold);
            let mut reconciler = HardwareReconciler::new();
            let mut prev = 0;
            reconciler.reconcile(first, &mut prev, &config);

            for raw in readings {
                let previous = prev;
                let result = reconciler.reconcile(raw, &mut prev, &config);

                prop_assert_eq!(prev, raw);
                if raw < previous {
                    prop_assert_eq!(result, Reconciliation::CounterReset { previous, raw });
                    prop_assert_eq!(result.delta(), 0);
                } else if raw - previous > threshold {
                    prop_assert_eq!(result, Reconciliation::ImplausibleJump { previous, raw });
                    prop_assert_eq!(result.delta(), 0);
                } else {
                    prop_assert_eq!(result.delta(), raw - previous);
                }
            }
        }
    }
}
