//! FlexTrack Steps - On-device step tracking engine
//!
//! Turns raw motion-sensor input into persisted session, daily and lifetime
//! step counts: motion filtering → step detection (accelerometer) or hardware
//! counter reconciliation → counter store → update publishing.
//!
//! ## Modules
//!
//! - **Core**: [`tracker::Tracker`], the single-threaded engine
//! - **Engine**: [`engine::TrackerHandle`], the engine on a background worker
//! - **Stages**: filter, detector, reconciler, metrics, store, session, publisher

pub mod clock;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod filter;
pub mod input;
pub mod metrics;
pub mod publisher;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use engine::TrackerHandle;
pub use error::TrackerError;
pub use input::SensorRecord;
pub use publisher::SubscriptionId;
pub use store::{JsonFileStorage, MemoryStorage, SnapshotStorage};
pub use tracker::{Command, Input, Tracker};
pub use types::{CounterSnapshot, MotionSample, SensorPath, SessionState, StepEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
