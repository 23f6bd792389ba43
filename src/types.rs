//! Core types for the FlexTrack step engine
//!
//! This module defines the data that flows through each stage of the engine:
//! raw motion samples, filter state, discrete step events and the persisted
//! counter snapshot.

use serde::{Deserialize, Serialize};

/// Default daily step goal
pub const DEFAULT_DAILY_GOAL: u32 = 10_000;

/// One 3-axis accelerometer reading (m/s²)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl MotionSample {
    pub fn new(x: f32, y: f32, z: f32, timestamp: i64) -> Self {
        Self { x, y, z, timestamp }
    }

    pub fn axes(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Exponential smoothing history carried between motion samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Low-passed gravity estimate per axis
    pub gravity: [f32; 3],
    /// Last linear acceleration per axis (raw minus gravity)
    pub linear: [f32; 3],
}

/// A detected (or hardware-reported) batch of steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Number of steps, normally 1 on the software path
    pub count: u32,
}

/// Which input stream drives the engine on this device.
///
/// Chosen once at startup and never switched mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorPath {
    /// Absolute hardware pedometer readings
    HardwareCounter,
    /// Raw accelerometer samples with software step detection
    Accelerometer,
    /// Neither sensor is present
    Unavailable,
}

impl SensorPath {
    /// Prefer the hardware counter, fall back to the accelerometer.
    pub fn select(has_step_counter: bool, has_accelerometer: bool) -> Self {
        if has_step_counter {
            SensorPath::HardwareCounter
        } else if has_accelerometer {
            SensorPath::Accelerometer
        } else {
            SensorPath::Unavailable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorPath::HardwareCounter => "hardware_counter",
            SensorPath::Accelerometer => "accelerometer",
            SensorPath::Unavailable => "unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, SensorPath::Unavailable)
    }
}

/// Lifecycle state derived from the persisted tracking flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Stopped,
    Tracking,
    Paused,
}

/// The persisted counter aggregate.
///
/// Exactly one exists per install. Field names are the stable storage keys;
/// keys missing from an older record take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterSnapshot {
    /// Steps since the last `start()`/`reset_session()`
    pub session_steps: u32,
    /// Steps since the last day rollover
    pub daily_steps: u32,
    /// Lifetime steps, never zeroed by a user action
    pub total_steps: u32,
    /// Last raw hardware counter value seen
    pub previous_hardware_reading: u32,
    pub is_tracking: bool,
    /// Epoch ms when the current active period began
    pub start_time: i64,
    /// Epoch ms when paused, 0 if not paused
    pub pause_time: i64,
    /// YYYY-MM-DD of the last save, for rollover detection
    pub last_saved_day: String,
    pub calories_burned: f32,
    pub distance_meters: f32,
    pub daily_goal: u32,
}

impl Default for CounterSnapshot {
    fn default() -> Self {
        Self {
            session_steps: 0,
            daily_steps: 0,
            total_steps: 0,
            previous_hardware_reading: 0,
            is_tracking: false,
            start_time: 0,
            pause_time: 0,
            last_saved_day: String::new(),
            calories_burned: 0.0,
            distance_meters: 0.0,
            daily_goal: DEFAULT_DAILY_GOAL,
        }
    }
}

impl CounterSnapshot {
    /// First-run record: all zeros, stamped with today's date
    pub fn fresh(today: &str, daily_goal: u32) -> Self {
        Self {
            last_saved_day: today.to_string(),
            daily_goal,
            ..Default::default()
        }
    }

    pub fn session_state(&self) -> SessionState {
        if self.is_tracking {
            SessionState::Tracking
        } else if self.pause_time > 0 {
            SessionState::Paused
        } else {
            SessionState::Stopped
        }
    }

    /// A session with steps exists but is not currently tracking
    pub fn is_session_paused(&self) -> bool {
        self.session_steps > 0 && !self.is_tracking
    }

    /// Active time of the current session, excluding paused intervals
    pub fn elapsed_active_ms(&self, now: i64) -> i64 {
        let end = match self.session_state() {
            SessionState::Tracking => now,
            SessionState::Paused => self.pause_time,
            SessionState::Stopped => return 0,
        };
        end.saturating_sub(self.start_time).max(0)
    }

    /// Daily progress towards the goal (may exceed 100)
    pub fn goal_progress_percent(&self) -> u32 {
        if self.daily_goal == 0 {
            return 0;
        }
        ((self.daily_steps as u64 * 100) / self.daily_goal as u64) as u32
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
