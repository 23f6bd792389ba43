//! Background worker and host-facing handle
//!
//! A single worker thread owns the [`Tracker`] and processes sensor input and
//! lifecycle commands from one queue, in arrival order. Callers never wait on
//! the worker beyond enqueueing; results are observed through the published
//! snapshots or [`TrackerHandle::current_snapshot`].

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::publisher::SubscriptionId;
use crate::store::{JsonFileStorage, SnapshotStorage};
use crate::tracker::{Command, Input, Tracker};
use crate::types::{CounterSnapshot, MotionSample, SensorPath};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

enum Message {
    Input(Input),
    Subscribe {
        id: SubscriptionId,
        sender: SyncSender<CounterSnapshot>,
    },
    Unsubscribe(SubscriptionId),
    Shutdown,
}

/// Handle to a running step tracker
pub struct TrackerHandle {
    sender: Sender<Message>,
    shared: Arc<RwLock<CounterSnapshot>>,
    path: SensorPath,
    subscriber_buffer: usize,
    next_subscription: AtomicU64,
    worker: Option<JoinHandle<Result<CounterSnapshot, TrackerError>>>,
}

impl TrackerHandle {
    /// Load state and start the worker.
    ///
    /// Loading happens on the calling thread so a broken store is reported here
    /// rather than lost inside the worker.
    pub fn spawn(
        config: TrackerConfig,
        path: SensorPath,
        storage: Box<dyn SnapshotStorage>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, TrackerError> {
        let subscriber_buffer = config.subscriber_buffer;
        let tracker = Tracker::new(config, path, storage, clock)?;
        let shared = Arc::new(RwLock::new(tracker.snapshot().clone()));
        let (sender, receiver) = mpsc::channel();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("step-tracker".to_string())
            .spawn(move || run_worker(tracker, receiver, worker_shared))?;

        Ok(Self {
            sender,
            shared,
            path,
            subscriber_buffer,
            next_subscription: AtomicU64::new(0),
            worker: Some(worker),
        })
    }

    /// Start a tracker persisting to a JSON state file, on the system clock
    pub fn open(
        state_path: &Path,
        config: TrackerConfig,
        path: SensorPath,
    ) -> Result<Self, TrackerError> {
        Self::spawn(
            config,
            path,
            Box::new(JsonFileStorage::new(state_path)),
            Box::new(SystemClock),
        )
    }

    pub fn sensor_path(&self) -> SensorPath {
        self.path
    }

    /// False when neither a step counter nor an accelerometer is present
    pub fn is_available(&self) -> bool {
        self.path.is_available()
    }

    /// Point-in-time copy of the counters
    pub fn current_snapshot(&self) -> CounterSnapshot {
        match self.shared.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn push_motion_sample(&self, sample: MotionSample) -> Result<(), TrackerError> {
        self.send(Message::Input(Input::Motion(sample)))
    }

    pub fn push_hardware_reading(&self, raw: u32) -> Result<(), TrackerError> {
        self.send(Message::Input(Input::Hardware(raw)))
    }

    /// Enqueue a stream of motion samples; returns how many were queued
    pub fn feed_motion<I>(&self, samples: I) -> Result<usize, TrackerError>
    where
        I: IntoIterator<Item = MotionSample>,
    {
        let mut queued = 0;
        for sample in samples {
            self.push_motion_sample(sample)?;
            queued += 1;
        }
        Ok(queued)
    }

    /// Enqueue a stream of hardware readings; returns how many were queued
    pub fn feed_hardware<I>(&self, readings: I) -> Result<usize, TrackerError>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut queued = 0;
        for raw in readings {
            self.push_hardware_reading(raw)?;
            queued += 1;
        }
        Ok(queued)
    }

    pub fn command(&self, command: Command) -> Result<(), TrackerError> {
        self.send(Message::Input(Input::Command(command)))
    }

    pub fn start(&self) -> Result<(), TrackerError> {
        self.command(Command::Start)
    }

    pub fn pause(&self) -> Result<(), TrackerError> {
        self.command(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), TrackerError> {
        self.command(Command::Resume)
    }

    pub fn stop(&self) -> Result<(), TrackerError> {
        self.command(Command::Stop)
    }

    pub fn reset_session(&self) -> Result<(), TrackerError> {
        self.command(Command::ResetSession)
    }

    pub fn reset_all(&self) -> Result<(), TrackerError> {
        self.command(Command::ResetAll)
    }

    pub fn set_daily_goal(&self, goal: u32) -> Result<(), TrackerError> {
        self.command(Command::SetDailyGoal(goal))
    }

    /// Receive a snapshot after every applied change.
    ///
    /// Updates that arrive while the receiver's queue is full are dropped for
    /// this subscriber; [`TrackerHandle::current_snapshot`] is always current.
    pub fn subscribe(&self) -> Result<(SubscriptionId, Receiver<CounterSnapshot>), TrackerError> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::sync_channel(self.subscriber_buffer.max(1));
        self.send(Message::Subscribe { id, sender })?;
        Ok((id, receiver))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TrackerError> {
        self.send(Message::Unsubscribe(id))
    }

    /// Drain queued input, flush and stop the worker. Returns the final
    /// counters, or the error from the final flush.
    pub fn shutdown(mut self) -> Result<CounterSnapshot, TrackerError> {
        self.stop_worker()
    }

    fn send(&self, message: Message) -> Result<(), TrackerError> {
        self.sender
            .send(message)
            .map_err(|_| TrackerError::WorkerStopped)
    }

    fn stop_worker(&mut self) -> Result<CounterSnapshot, TrackerError> {
        let worker = self.worker.take().ok_or(TrackerError::WorkerStopped)?;
        // The worker may already be gone; joining reports why
        let _ = self.sender.send(Message::Shutdown);
        worker.join().map_err(|_| TrackerError::WorkerStopped)?
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop_worker() {
                log::warn!("Step tracker did not shut down cleanly: {}", e);
            }
        }
    }
}

fn run_worker(
    mut tracker: Tracker,
    receiver: Receiver<Message>,
    shared: Arc<RwLock<CounterSnapshot>>,
) -> Result<CounterSnapshot, TrackerError> {
    log::info!(
        "Step tracker worker started ({})",
        tracker.sensor_path().as_str()
    );

    // A closed channel means every handle is gone; treat it like shutdown
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Input(input) => {
                tracker.handle(input);
            }
            Message::Subscribe { id, sender } => {
                // New observers see the current state right away
                let _ = sender.try_send(tracker.snapshot().clone());
                tracker.add_subscriber(id, sender);
            }
            Message::Unsubscribe(id) => {
                tracker.unsubscribe(id);
            }
            Message::Shutdown => break,
        }
        share(&shared, tracker.snapshot());
    }

    tracker.shutdown()?;
    log::info!("Step tracker worker stopped");
    Ok(tracker.snapshot().clone())
}

fn share(shared: &RwLock<CounterSnapshot>, snapshot: &CounterSnapshot) {
    let mut guard = match shared.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *guard != *snapshot {
        *guard = snapshot.clone();
    }
}
