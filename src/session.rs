//! Session lifecycle
//!
//! `Stopped -> Tracking <-> Paused`, with `stop()` returning to `Stopped`.
//! The state is derived from the persisted `is_tracking`/`pause_time` fields,
//! so it survives a process restart. Operations invoked from a state where they
//! do not apply are no-ops and report `false`.

use crate::types::{CounterSnapshot, SessionState};

/// Lifecycle operations over the counter snapshot
pub struct SessionController;

impl SessionController {
    /// Begin a new session from any state, re-arming it if already tracking
    pub fn start(snapshot: &mut CounterSnapshot, now: i64) -> bool {
        snapshot.is_tracking = true;
        snapshot.session_steps = 0;
        snapshot.calories_burned = 0.0;
        snapshot.distance_meters = 0.0;
        snapshot.start_time = now;
        snapshot.pause_time = 0;
        true
    }

    pub fn pause(snapshot: &mut CounterSnapshot, now: i64) -> bool {
        if snapshot.session_state() != SessionState::Tracking {
            log::debug!("Ignoring pause while {:?}", snapshot.session_state());
            return false;
        }
        snapshot.is_tracking = false;
        // pause_time 0 means "not paused", so a clock at the epoch still records 1
        snapshot.pause_time = now.max(1);
        true
    }

    /// Shift `start_time` forward by the paused interval and resume tracking
    pub fn resume(snapshot: &mut CounterSnapshot, now: i64) -> bool {
        if snapshot.session_state() != SessionState::Paused {
            log::debug!("Ignoring resume while {:?}", snapshot.session_state());
            return false;
        }
        let pause_duration = now.saturating_sub(snapshot.pause_time).max(0);
        snapshot.start_time = snapshot.start_time.saturating_add(pause_duration);
        snapshot.pause_time = 0;
        snapshot.is_tracking = true;
        true
    }

    pub fn stop(snapshot: &mut CounterSnapshot) -> bool {
        if snapshot.session_state() == SessionState::Stopped {
            return false;
        }
        snapshot.is_tracking = false;
        snapshot.pause_time = 0;
        true
    }

    /// Zero the session counters and restart the session clock at `now`;
    /// daily and lifetime counts are untouched. A paused session stays paused
    /// with no active time.
    pub fn reset_session(snapshot: &mut CounterSnapshot, now: i64) -> bool {
        snapshot.session_steps = 0;
        snapshot.calories_burned = 0.0;
        snapshot.distance_meters = 0.0;
        if snapshot.session_state() == SessionState::Paused {
            snapshot.pause_time = now.max(1);
            snapshot.start_time = snapshot.pause_time;
        } else {
            snapshot.start_time = now;
        }
        true
    }

    /// Zero session and daily counters. The lifetime count comes from the
    /// hardware sensor and is never reset by the user.
    pub fn reset_all(snapshot: &mut CounterSnapshot, now: i64) -> bool {
        Self::reset_session(snapshot, now);
        snapshot.daily_steps = 0;
        true
    }

    /// A goal of 0 is ignored
    pub fn set_daily_goal(snapshot: &mut CounterSnapshot, goal: u32) -> bool {
        if goal == 0 {
            log::debug!("Ignoring daily goal of 0");
            return false;
        }
        snapshot.daily_goal = goal;
        true
    }
}
