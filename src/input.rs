//! Sensor and command records
//!
//! A flat, line-oriented format for feeding the engine from outside the
//! process: recorded sensor traces, host bridges and the CLI all use it.
//!
//! ```text
//! {"type":"hardware","value":10432,"timestamp":1704067200000}
//! {"type":"motion","x":0.1,"y":9.7,"z":0.4,"timestamp":1704067200020}
//! {"type":"command","command":"set_daily_goal","goal":8000,"timestamp":1704067200040}
//! ```

use crate::error::TrackerError;
use crate::tracker::{Command, Input};
use crate::types::MotionSample;
use serde::{Deserialize, Serialize};

/// Lifecycle command names as they appear in records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Start,
    Pause,
    Resume,
    Stop,
    ResetSession,
    ResetAll,
    SetDailyGoal,
}

/// One input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorRecord {
    Motion {
        x: f32,
        y: f32,
        z: f32,
        timestamp: i64,
    },
    Hardware {
        value: u32,
        timestamp: i64,
    },
    Command {
        command: CommandKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        goal: Option<u32>,
        timestamp: i64,
    },
}

impl SensorRecord {
    /// Epoch milliseconds the record was captured at
    pub fn timestamp(&self) -> i64 {
        match self {
            SensorRecord::Motion { timestamp, .. }
            | SensorRecord::Hardware { timestamp, .. }
            | SensorRecord::Command { timestamp, .. } => *timestamp,
        }
    }

    /// Convert into an engine input
    pub fn to_input(&self) -> Result<Input, TrackerError> {
        let input = match *self {
            SensorRecord::Motion { x, y, z, timestamp } => {
                Input::Motion(MotionSample::new(x, y, z, timestamp))
            }
            SensorRecord::Hardware { value, .. } => Input::Hardware(value),
            SensorRecord::Command { command, goal, .. } => Input::Command(match command {
                CommandKind::Start => Command::Start,
                CommandKind::Pause => Command::Pause,
                CommandKind::Resume => Command::Resume,
                CommandKind::Stop => Command::Stop,
                CommandKind::ResetSession => Command::ResetSession,
                CommandKind::ResetAll => Command::ResetAll,
                CommandKind::SetDailyGoal => Command::SetDailyGoal(goal.ok_or_else(|| {
                    TrackerError::ParseError("set_daily_goal requires a goal".to_string())
                })?),
            }),
        };
        Ok(input)
    }

    /// Parse newline-delimited records, skipping blank lines
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<SensorRecord>, TrackerError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SensorRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(TrackerError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Parse a JSON array of records
    pub fn parse_array(json: &str) -> Result<Vec<SensorRecord>, TrackerError> {
        serde_json::from_str(json).map_err(|e| TrackerError::ParseError(e.to_string()))
    }
}
