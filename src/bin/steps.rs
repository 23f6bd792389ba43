//! Steps CLI - Command-line interface for the FlexTrack step tracker
//!
//! Commands:
//! - replay: Drive the tracker from recorded sensor/command records
//! - status: Show the stored counters
//! - reset: Clear the session (or session and daily) counters
//! - goal: Set the daily step goal
//! - doctor: Diagnose configuration and state file health
//! - schema: Print the record and snapshot schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use flextrack_steps::clock::{Clock, ManualClock, SystemClock};
use flextrack_steps::input::SensorRecord;
use flextrack_steps::store::{JsonFileStorage, SnapshotStorage};
use flextrack_steps::{
    Command, CounterSnapshot, SensorPath, Tracker, TrackerConfig, TrackerError, VERSION,
};

/// Steps - On-device step tracking engine
#[derive(Parser)]
#[command(name = "steps")]
#[command(author = "FlexTrack Contributors")]
#[command(version = VERSION)]
#[command(about = "Count steps from sensor traces and manage stored counters", long_about = None)]
struct Cli {
    /// Tracker configuration file (JSON); defaults are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Counter state file
    #[arg(long, global = true, default_value = "steps-state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the tracker from recorded sensor and command records
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Step source to use
        #[arg(long, default_value = "auto")]
        sensor: SensorArg,

        /// Print every published snapshot instead of only the final one
        #[arg(long)]
        emit_updates: bool,
    },

    /// Show the stored counters
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear the session counters
    Reset {
        /// Also clear today's count
        #[arg(long)]
        all: bool,
    },

    /// Set the daily step goal
    Goal {
        /// Steps per day
        goal: u32,
    },

    /// Diagnose configuration and state file health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// JSON array of snapshots
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SensorArg {
    /// Hardware counter if the input has readings, else accelerometer
    Auto,
    /// Hardware step counter readings only
    Hardware,
    /// Accelerometer samples only
    Accelerometer,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input records (motion, hardware, command)
    Input,
    /// Persisted counter snapshot
    Snapshot,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StepsCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            output_format,
            sensor,
            emit_updates,
        } => cmd_replay(
            &input,
            input_format,
            output_format,
            sensor,
            emit_updates,
            &cli.state,
            load_config(cli.config.as_deref())?,
        ),

        Commands::Status { json } => cmd_status(&cli.state, json),

        Commands::Reset { all } => {
            let command = if all {
                Command::ResetAll
            } else {
                Command::ResetSession
            };
            cmd_apply(&cli.state, load_config(cli.config.as_deref())?, command)
        }

        Commands::Goal { goal } => {
            if goal == 0 {
                return Err(StepsCliError::InvalidGoal);
            }
            let config = load_config(cli.config.as_deref())?;
            cmd_apply(&cli.state, config, Command::SetDailyGoal(goal))
        }

        Commands::Doctor { json } => cmd_doctor(cli.config.as_deref(), &cli.state, json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, StepsCliError> {
    match path {
        Some(path) => Ok(TrackerConfig::from_file(path)?),
        None => Ok(TrackerConfig::default()),
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    sensor: SensorArg,
    emit_updates: bool,
    state: &Path,
    config: TrackerConfig,
) -> Result<(), StepsCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match input_format {
        InputFormat::Ndjson => SensorRecord::parse_ndjson(&input_data)?,
        InputFormat::Json => SensorRecord::parse_array(&input_data)?,
    };
    let first = records.first().ok_or(StepsCliError::NoRecords)?;

    let path = match sensor {
        SensorArg::Auto => {
            let has_hardware = records
                .iter()
                .any(|r| matches!(r, SensorRecord::Hardware { .. }));
            let has_motion = records
                .iter()
                .any(|r| matches!(r, SensorRecord::Motion { .. }));
            SensorPath::select(has_hardware, has_motion)
        }
        SensorArg::Hardware => SensorPath::HardwareCounter,
        SensorArg::Accelerometer => SensorPath::Accelerometer,
    };
    if !path.is_available() {
        return Err(TrackerError::SensorUnavailable.into());
    }

    // Record timestamps drive the clock so day boundaries replay faithfully
    let clock = ManualClock::new(first.timestamp());
    let mut tracker = Tracker::new(
        config,
        path,
        Box::new(JsonFileStorage::new(state)),
        Box::new(clock.clone()),
    )?;
    let (_, updates) = tracker.subscribe();

    let mut snapshots: Vec<CounterSnapshot> = Vec::new();
    for record in &records {
        clock.set(record.timestamp());
        tracker.handle(record.to_input()?);
        if emit_updates {
            snapshots.extend(updates.try_iter());
        }
    }

    tracker.shutdown()?;
    if !emit_updates {
        snapshots.push(tracker.snapshot().clone());
    }

    print!("{}", format_output(&snapshots, &output_format)?);
    Ok(())
}

fn cmd_status(state: &Path, json: bool) -> Result<(), StepsCliError> {
    let snapshot = JsonFileStorage::new(state)
        .load()?
        .ok_or_else(|| StepsCliError::NoState(state.to_path_buf()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let elapsed_secs = snapshot.elapsed_active_ms(SystemClock.now_ms()) / 1000;
    println!("Step Counters");
    println!("=============");
    println!("State:     {:?}", snapshot.session_state());
    println!(
        "Session:   {} steps, {:.1} kcal, {:.0} m, {}:{:02} active",
        snapshot.session_steps,
        snapshot.calories_burned,
        snapshot.distance_meters,
        elapsed_secs / 60,
        elapsed_secs % 60
    );
    println!(
        "Today:     {} / {} steps ({}%) on {}",
        snapshot.daily_steps,
        snapshot.daily_goal,
        snapshot.goal_progress_percent(),
        snapshot.last_saved_day
    );
    println!("Lifetime:  {} steps", snapshot.total_steps);
    Ok(())
}

fn cmd_apply(state: &Path, config: TrackerConfig, command: Command) -> Result<(), StepsCliError> {
    // Offline edits never read a sensor; any available path keeps a persisted
    // session running as it was.
    let mut tracker = Tracker::new(
        config,
        SensorPath::HardwareCounter,
        Box::new(JsonFileStorage::new(state)),
        Box::new(SystemClock),
    )?;
    tracker.apply_command(command);
    tracker.shutdown()?;

    println!("{}", serde_json::to_string_pretty(tracker.snapshot())?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, state: &Path, json: bool) -> Result<(), StepsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("flextrack-steps {}", VERSION),
    });

    checks.push(match config {
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        },
        Some(path) => match TrackerConfig::from_file(path) {
            Ok(_) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!("Config file {} is valid", path.display()),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
    });

    checks.push(match JsonFileStorage::new(state).load() {
        Ok(Some(snapshot)) => DoctorCheck {
            name: "state".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "State file valid ({} lifetime steps, last saved {})",
                snapshot.total_steps, snapshot.last_saved_day
            ),
        },
        Ok(None) => DoctorCheck {
            name: "state".to_string(),
            status: CheckStatus::Warning,
            message: format!("State file {} does not exist yet", state.display()),
        },
        Err(e) => DoctorCheck {
            name: "state".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    // Check stdin is available (for piped replays)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay with --input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Steps Doctor Report");
        println!("===================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StepsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), StepsCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input records: one JSON object per line, tagged by \"type\"");
                println!();
                println!("1. motion - Accelerometer sample (m/s^2)");
                println!("   {{ x, y, z, timestamp }}");
                println!();
                println!("2. hardware - Cumulative step counter reading since boot");
                println!("   {{ value, timestamp }}");
                println!();
                println!("3. command - Session lifecycle command");
                println!("   {{ command, goal?, timestamp }}");
                println!("   command: start, pause, resume, stop, reset_session, reset_all,");
                println!("            set_daily_goal");
                println!();
                println!("Timestamps are epoch milliseconds and drive the replay clock.");
            }
        }
        SchemaType::Snapshot => {
            if json_schema {
                println!("{}", get_snapshot_json_schema());
            } else {
                println!("Counter snapshot (persisted state and published updates)");
                println!();
                println!("- session_steps, daily_steps, total_steps: step counters");
                println!("- previous_hardware_reading: last raw hardware counter value");
                println!("- is_tracking: session is counting");
                println!("- start_time, pause_time: epoch ms (pause_time 0 = not paused)");
                println!("- last_saved_day: YYYY-MM-DD of the daily counter");
                println!("- calories_burned (kcal), distance_meters: session metrics");
                println!("- daily_goal: steps per day");
            }
        }
    }

    Ok(())
}

// Helper functions

fn format_output(
    snapshots: &[CounterSnapshot],
    format: &OutputFormat,
) -> Result<String, StepsCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for snapshot in snapshots {
                lines.push(serde_json::to_string(snapshot)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(snapshots)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(snapshots)? + "\n"),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "steps.sensor_record",
        "description": "Step tracker input record",
        "type": "object",
        "required": ["type", "timestamp"],
        "oneOf": [
            {
                "properties": {
                    "type": { "const": "motion" },
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "z": { "type": "number" },
                    "timestamp": { "type": "integer" }
                },
                "required": ["x", "y", "z"]
            },
            {
                "properties": {
                    "type": { "const": "hardware" },
                    "value": { "type": "integer", "minimum": 0 },
                    "timestamp": { "type": "integer" }
                },
                "required": ["value"]
            },
            {
                "properties": {
                    "type": { "const": "command" },
                    "command": {
                        "type": "string",
                        "enum": [
                            "start", "pause", "resume", "stop",
                            "reset_session", "reset_all", "set_daily_goal"
                        ]
                    },
                    "goal": { "type": "integer", "minimum": 1 },
                    "timestamp": { "type": "integer" }
                },
                "required": ["command"]
            }
        ]
    })
    .to_string()
}

fn get_snapshot_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "steps.counter_snapshot",
        "description": "Persisted step counters",
        "type": "object",
        "properties": {
            "session_steps": { "type": "integer", "minimum": 0 },
            "daily_steps": { "type": "integer", "minimum": 0 },
            "total_steps": { "type": "integer", "minimum": 0 },
            "previous_hardware_reading": { "type": "integer", "minimum": 0 },
            "is_tracking": { "type": "boolean" },
            "start_time": { "type": "integer" },
            "pause_time": { "type": "integer" },
            "last_saved_day": { "type": "string", "format": "date" },
            "calories_burned": { "type": "number" },
            "distance_meters": { "type": "number" },
            "daily_goal": { "type": "integer", "minimum": 1 }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum StepsCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NoRecords,
    NoState(PathBuf),
    InvalidGoal,
    DoctorFailed,
}

impl From<io::Error> for StepsCliError {
    fn from(e: io::Error) -> Self {
        StepsCliError::Io(e)
    }
}

impl From<TrackerError> for StepsCliError {
    fn from(e: TrackerError) -> Self {
        StepsCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for StepsCliError {
    fn from(e: serde_json::Error) -> Self {
        StepsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StepsCliError> for CliError {
    fn from(e: StepsCliError) -> Self {
        match e {
            StepsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StepsCliError::Tracker(e) => {
                let (code, hint) = match &e {
                    TrackerError::ParseError(_) => (
                        "PARSE_ERROR",
                        "Run 'steps schema input' for the record format",
                    ),
                    TrackerError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Run 'steps doctor --config <file>'")
                    }
                    TrackerError::PersistenceError(_) => (
                        "STATE_ERROR",
                        "Inspect or remove the state file; 'steps doctor' reports its health",
                    ),
                    TrackerError::SensorUnavailable => (
                        "SENSOR_UNAVAILABLE",
                        "Provide hardware or motion records",
                    ),
                    _ => ("TRACKER_ERROR", "Run 'steps doctor' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            StepsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StepsCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            StepsCliError::NoState(path) => CliError {
                code: "NO_STATE".to_string(),
                message: format!("No stored counters at {}", path.display()),
                hint: Some("Run 'steps replay' or pass --state".to_string()),
            },
            StepsCliError::InvalidGoal => CliError {
                code: "INVALID_GOAL".to_string(),
                message: "Daily goal must be at least 1 step".to_string(),
                hint: None,
            },
            StepsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
