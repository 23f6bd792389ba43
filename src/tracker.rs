//! Step tracking engine core
//!
//! [`Tracker`] wires the stages together on a single thread:
//! motion filter → step detector (accelerometer path) or hardware reconciler
//! (step counter path) → counter store → update publisher. The session state
//! gates whether sensor input is applied at all; input arriving while not
//! tracking is dropped, not buffered.
//!
//! The tracker itself is synchronous. [`crate::engine::TrackerHandle`] runs it
//! on a background worker.

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::detector::StepDetector;
use crate::error::TrackerError;
use crate::filter::MotionFilter;
use crate::publisher::{SubscriptionId, UpdatePublisher};
use crate::reconciler::{HardwareReconciler, Reconciliation};
use crate::session::SessionController;
use crate::store::{CounterStore, SnapshotStorage};
use crate::types::{CounterSnapshot, FilterState, MotionSample, SensorPath, StepEvent};
use std::sync::mpsc::{Receiver, SyncSender};

/// Lifecycle commands from the UI/host layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    ResetSession,
    ResetAll,
    SetDailyGoal(u32),
}

/// Everything the engine consumes, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Motion(MotionSample),
    Hardware(u32),
    Command(Command),
}

pub struct Tracker {
    config: TrackerConfig,
    path: SensorPath,
    store: CounterStore,
    filter: MotionFilter,
    filter_state: FilterState,
    detector: StepDetector,
    reconciler: HardwareReconciler,
    publisher: UpdatePublisher,
    clock: Box<dyn Clock>,
}

impl Tracker {
    /// Load persisted counters and prepare the selected input path
    pub fn new(
        config: TrackerConfig,
        path: SensorPath,
        storage: Box<dyn SnapshotStorage>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let store = CounterStore::open(storage, &clock.today(), &config)?;

        match path {
            SensorPath::HardwareCounter => log::debug!("Using device step counter sensor"),
            SensorPath::Accelerometer => log::debug!("Using accelerometer for step counting"),
            SensorPath::Unavailable => {
                log::error!("No step counter or accelerometer found on this device")
            }
        }

        let mut tracker = Self {
            filter: MotionFilter::new(config.gravity_alpha),
            config,
            path,
            store,
            filter_state: FilterState::default(),
            detector: StepDetector::new(),
            reconciler: HardwareReconciler::new(),
            publisher: UpdatePublisher::new(),
            clock,
        };

        if !path.is_available() && tracker.store.snapshot().is_tracking {
            // A session persisted on another sensor setup cannot continue here
            tracker.apply_command(Command::Stop);
        }
        Ok(tracker)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn sensor_path(&self) -> SensorPath {
        self.path
    }

    pub fn snapshot(&self) -> &CounterSnapshot {
        self.store.snapshot()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Active time of the current session at the tracker's clock
    pub fn elapsed_active_ms(&self) -> i64 {
        self.snapshot().elapsed_active_ms(self.clock.now_ms())
    }

    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<CounterSnapshot>) {
        self.publisher.subscribe(self.config.subscriber_buffer)
    }

    pub fn add_subscriber(&mut self, id: SubscriptionId, sender: SyncSender<CounterSnapshot>) {
        self.publisher.add(id, sender);
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.publisher.unsubscribe(id)
    }

    /// Dispatch one input. Returns the steps credited, if any.
    pub fn handle(&mut self, input: Input) -> Option<StepEvent> {
        match input {
            Input::Motion(sample) => self.on_motion_sample(&sample),
            Input::Hardware(raw) => self.on_hardware_reading(raw),
            Input::Command(command) => {
                self.apply_command(command);
                None
            }
        }
    }

    /// Software detection path
    pub fn on_motion_sample(&mut self, sample: &MotionSample) -> Option<StepEvent> {
        if self.path != SensorPath::Accelerometer {
            log::trace!("Ignoring motion sample on {} path", self.path.as_str());
            return None;
        }
        if !self.store.snapshot().is_tracking {
            return None;
        }

        let rolled = self.roll_day();
        let magnitude = self.filter.apply(sample, &mut self.filter_state);
        let step = self.detector.detect(magnitude, sample.timestamp, &self.config);

        match step {
            Some(event) => {
                self.store.apply_delta(event.count, &self.config);
                self.publish();
            }
            None if rolled => self.publish(),
            None => {}
        }
        step
    }

    /// Hardware step counter path
    pub fn on_hardware_reading(&mut self, raw: u32) -> Option<StepEvent> {
        if self.path != SensorPath::HardwareCounter {
            log::trace!("Ignoring hardware reading on {} path", self.path.as_str());
            return None;
        }
        if !self.store.snapshot().is_tracking {
            return None;
        }

        let rolled = self.roll_day();
        let previous_total = self.store.snapshot().total_steps;
        let snapshot = self.store.snapshot_mut();
        let result = self.reconciler.reconcile(
            raw,
            &mut snapshot.previous_hardware_reading,
            &self.config,
        );
        if let Reconciliation::Seeded { baseline } = result {
            // Lifetime count follows the hardware count but never moves backwards
            snapshot.total_steps = snapshot.total_steps.max(baseline);
        }

        match result.delta() {
            0 => {
                if result != (Reconciliation::Accepted { delta: 0 }) {
                    // Baseline moved
                    self.store.record_event();
                }
                if rolled || self.store.snapshot().total_steps != previous_total {
                    self.publish();
                }
                None
            }
            delta => {
                self.store.apply_delta(delta, &self.config);
                self.publish();
                Some(StepEvent {
                    timestamp: self.clock.now_ms(),
                    count: delta,
                })
            }
        }
    }

    /// Apply a lifecycle command. Returns whether anything changed.
    pub fn apply_command(&mut self, command: Command) -> bool {
        let now = self.clock.now_ms();
        let rolled = self.roll_day();
        let mut snapshot = self.store.snapshot().clone();

        let changed = match command {
            Command::Start => {
                if !self.path.is_available() {
                    log::warn!("Cannot start: tracking unavailable on this device");
                    false
                } else {
                    self.rearm_inputs();
                    SessionController::start(&mut snapshot, now)
                }
            }
            Command::Pause => SessionController::pause(&mut snapshot, now),
            Command::Resume => {
                if !self.path.is_available() {
                    false
                } else {
                    let resumed = SessionController::resume(&mut snapshot, now);
                    if resumed {
                        self.rearm_inputs();
                    }
                    resumed
                }
            }
            Command::Stop => SessionController::stop(&mut snapshot),
            Command::ResetSession => SessionController::reset_session(&mut snapshot, now),
            Command::ResetAll => SessionController::reset_all(&mut snapshot, now),
            Command::SetDailyGoal(goal) => SessionController::set_daily_goal(&mut snapshot, goal),
        };

        if changed {
            log::info!("{:?} -> {:?}", command, snapshot.session_state());
            *self.store.snapshot_mut() = snapshot;
        }
        if changed || rolled {
            self.store.commit();
            self.publish();
        }
        changed
    }

    /// Write pending changes now
    pub fn flush(&mut self) -> Result<(), TrackerError> {
        self.store.flush()
    }

    /// Flush before the tracker is released
    pub fn shutdown(&mut self) -> Result<(), TrackerError> {
        log::debug!("Step tracker shutting down");
        self.store.flush()
    }

    fn roll_day(&mut self) -> bool {
        let today = self.clock.today();
        self.store.check_day_rollover(&today)
    }

    // Readings are dropped while not tracking, so the first one after arming
    // must seed a new baseline rather than credit the steps taken meanwhile.
    fn rearm_inputs(&mut self) {
        self.reconciler.rearm();
        self.detector = StepDetector::new();
    }

    fn publish(&mut self) {
        self.publisher.publish(self.store.snapshot());
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if self.store.is_dirty() {
            if let Err(e) = self.store.flush() {
                log::warn!("Failed to persist step counters on shutdown: {}", e);
            }
        }
    }
}
