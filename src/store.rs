//! Counter store
//!
//! Owns the single authoritative [`CounterSnapshot`], applies step deltas and
//! day rollovers to it in memory, and flushes it to a [`SnapshotStorage`]
//! backend. Step deltas are flushed every `flush_every_events` applied events;
//! lifecycle changes flush immediately. A failed write leaves the store dirty
//! and is retried at the next flush.

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::metrics;
use crate::types::CounterSnapshot;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable home of the snapshot
pub trait SnapshotStorage: Send {
    /// Load the stored snapshot, `None` on first run
    fn load(&self) -> Result<Option<CounterSnapshot>, TrackerError>;

    /// Replace the stored snapshot atomically
    fn save(&mut self, snapshot: &CounterSnapshot) -> Result<(), TrackerError>;
}

/// JSON file backend. Writes go to a sibling temp file which is then renamed
/// over the target, so a crash never leaves a half-written record.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<CounterSnapshot>, TrackerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        let snapshot = CounterSnapshot::from_json(&json).map_err(|e| {
            TrackerError::PersistenceError(format!(
                "corrupt state file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(snapshot))
    }

    fn save(&mut self, snapshot: &CounterSnapshot) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        let json = serde_json::to_string_pretty(snapshot)?;
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryCell {
    json: Option<String>,
    fail_writes: bool,
    writes: usize,
}

/// In-memory backend. Clones share the same record, so a host or test can keep
/// one copy to inspect what the engine persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    cell: Arc<Mutex<MemoryCell>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: &CounterSnapshot) -> Result<Self, TrackerError> {
        let storage = Self::new();
        storage.lock()?.json = Some(snapshot.to_json()?);
        Ok(storage)
    }

    /// Make subsequent writes fail until switched off again
    pub fn set_fail_writes(&self, fail: bool) -> Result<(), TrackerError> {
        self.lock()?.fail_writes = fail;
        Ok(())
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.lock().map(|cell| cell.writes).unwrap_or(0)
    }

    /// The last successfully written snapshot
    pub fn stored(&self) -> Option<CounterSnapshot> {
        let cell = self.lock().ok()?;
        let json = cell.json.as_deref()?;
        CounterSnapshot::from_json(json).ok()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryCell>, TrackerError> {
        self.cell
            .lock()
            .map_err(|_| TrackerError::PersistenceError("memory storage poisoned".to_string()))
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> Result<Option<CounterSnapshot>, TrackerError> {
        let cell = self.lock()?;
        match cell.json.as_deref() {
            Some(json) => Ok(Some(CounterSnapshot::from_json(json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, snapshot: &CounterSnapshot) -> Result<(), TrackerError> {
        let json = snapshot.to_json()?;
        let mut cell = self.lock()?;
        if cell.fail_writes {
            return Err(TrackerError::PersistenceError(
                "simulated write failure".to_string(),
            ));
        }
        cell.json = Some(json);
        cell.writes += 1;
        Ok(())
    }
}

/// Credit `delta` steps to the session, daily and lifetime counters together
/// with the matching calories and distance.
pub fn apply_delta(delta: u32, snapshot: &mut CounterSnapshot, config: &TrackerConfig) {
    if delta == 0 {
        return;
    }
    snapshot.session_steps = snapshot.session_steps.saturating_add(delta);
    snapshot.daily_steps = snapshot.daily_steps.saturating_add(delta);
    snapshot.total_steps = snapshot.total_steps.saturating_add(delta);

    let (calories, distance) = metrics::estimate(delta, config);
    snapshot.calories_burned += calories;
    snapshot.distance_meters += distance;
}

/// Zero the daily counter when `today` differs from the stored day.
///
/// A `today` earlier than the stored day means the clock moved backwards; the
/// marker and the counter are left alone. Returns whether a rollover happened.
pub fn check_day_rollover(snapshot: &mut CounterSnapshot, today: &str) -> bool {
    if snapshot.last_saved_day == today {
        return false;
    }
    if !snapshot.last_saved_day.is_empty() && today < snapshot.last_saved_day.as_str() {
        log::warn!(
            "Clock moved back from {} to {}; keeping daily count",
            snapshot.last_saved_day,
            today
        );
        return false;
    }

    log::info!(
        "New day detected ({} -> {}). Resetting daily step count",
        snapshot.last_saved_day,
        today
    );
    snapshot.daily_steps = 0;
    snapshot.last_saved_day = today.to_string();
    true
}

/// Snapshot owner with throttled persistence
pub struct CounterStore {
    storage: Box<dyn SnapshotStorage>,
    snapshot: CounterSnapshot,
    flush_every: u32,
    pending_events: u32,
    dirty: bool,
}

impl CounterStore {
    /// Load the stored snapshot (or create the first-run record) and apply any
    /// pending day rollover.
    pub fn open(
        storage: Box<dyn SnapshotStorage>,
        today: &str,
        config: &TrackerConfig,
    ) -> Result<Self, TrackerError> {
        let (snapshot, dirty) = match storage.load()? {
            Some(snapshot) => (snapshot, false),
            None => {
                log::info!("No stored step counters, starting fresh for {}", today);
                (CounterSnapshot::fresh(today, config.default_daily_goal), true)
            }
        };

        let mut store = Self {
            storage,
            snapshot,
            flush_every: config.flush_every_events.max(1),
            pending_events: 0,
            dirty,
        };
        if store.check_day_rollover(today) {
            store.dirty = true;
        }
        if store.dirty {
            store.flush_logged();
        }
        Ok(store)
    }

    pub fn snapshot(&self) -> &CounterSnapshot {
        &self.snapshot
    }

    /// Mutable access for lifecycle operations; callers follow up with
    /// [`CounterStore::commit`].
    pub fn snapshot_mut(&mut self) -> &mut CounterSnapshot {
        self.dirty = true;
        &mut self.snapshot
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn check_day_rollover(&mut self, today: &str) -> bool {
        let rolled = check_day_rollover(&mut self.snapshot, today);
        if rolled {
            self.dirty = true;
        }
        rolled
    }

    /// Apply a step delta and flush if the event cadence is reached
    pub fn apply_delta(&mut self, delta: u32, config: &TrackerConfig) {
        apply_delta(delta, &mut self.snapshot, config);
        self.record_event();
    }

    /// Count one state-changing event towards the flush cadence
    pub fn record_event(&mut self) {
        self.dirty = true;
        self.pending_events += 1;
        if self.pending_events >= self.flush_every {
            self.flush_logged();
        }
    }

    /// Flush now (lifecycle transitions), logging rather than returning errors
    pub fn commit(&mut self) {
        self.flush_logged();
    }

    /// Write the snapshot if anything changed since the last successful write
    pub fn flush(&mut self) -> Result<(), TrackerError> {
        if !self.dirty {
            return Ok(());
        }
        self.storage.save(&self.snapshot)?;
        self.dirty = false;
        self.pending_events = 0;
        Ok(())
    }

    fn flush_logged(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("Failed to persist step counters, will retry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(flush_every: u32) -> TrackerConfig {
        TrackerConfig {
            flush_every_events: flush_every,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_delta_updates_all_counters() {
        let config = TrackerConfig::default();
        let mut snapshot = CounterSnapshot::fresh("2024-01-01", 10_000);

        apply_delta(10, &mut snapshot, &config);

        assert_eq!(snapshot.session_steps, 10);
        assert_eq!(snapshot.daily_steps, 10);
        assert_eq!(snapshot.total_steps, 10);
        assert!((snapshot.calories_burned - 0.4).abs() < 1e-4);
        assert!((snapshot.distance_meters - 7.5).abs() < 1e-4);
    }

    #[test]
    fn test_day_rollover_resets_daily_only() {
        let mut snapshot = CounterSnapshot::fresh("2024-01-01", 10_000);
        snapshot.daily_steps = 5_000;
        snapshot.session_steps = 300;
        snapshot.total_steps = 90_000;

        assert!(check_day_rollover(&mut snapshot, "2024-01-02"));

        assert_eq!(snapshot.daily_steps, 0);
        assert_eq!(snapshot.last_saved_day, "2024-01-02");
        assert_eq!(snapshot.session_steps, 300);
        assert_eq!(snapshot.total_steps, 90_000);

        // Second check on the same day is a no-op
        snapshot.daily_steps = 12;
        assert!(!check_day_rollover(&mut snapshot, "2024-01-02"));
        assert_eq!(snapshot.daily_steps, 12);
    }

    #[test]
    fn test_day_rollover_ignores_backward_clock() {
        let mut snapshot = CounterSnapshot::fresh("2024-01-02", 10_000);
        snapshot.daily_steps = 40;

        assert!(!check_day_rollover(&mut snapshot, "2024-01-01"));
        assert_eq!(snapshot.daily_steps, 40);
        assert_eq!(snapshot.last_saved_day, "2024-01-02");
    }

    #[test]
    fn test_day_rollover_from_legacy_empty_marker() {
        let mut snapshot = CounterSnapshot {
            daily_steps: 77,
            ..Default::default()
        };
        assert!(check_day_rollover(&mut snapshot, "2024-03-10"));
        assert_eq!(snapshot.daily_steps, 0);
    }

    #[test]
    fn test_open_creates_first_run_record() {
        let storage = MemoryStorage::new();
        let store =
            CounterStore::open(Box::new(storage.clone()), "2024-01-01", &config(20)).unwrap();

        assert_eq!(store.snapshot(), &CounterSnapshot::fresh("2024-01-01", 10_000));
        assert_eq!(storage.write_count(), 1);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_open_applies_rollover_to_loaded_state() {
        let mut stored = CounterSnapshot::fresh("2024-01-01", 10_000);
        stored.daily_steps = 4_000;
        let storage = MemoryStorage::with_snapshot(&stored).unwrap();

        let store =
            CounterStore::open(Box::new(storage.clone()), "2024-01-02", &config(20)).unwrap();

        assert_eq!(store.snapshot().daily_steps, 0);
        assert_eq!(storage.stored().unwrap().last_saved_day, "2024-01-02");
    }

    #[test]
    fn test_flush_cadence() {
        let storage = MemoryStorage::with_snapshot(&CounterSnapshot::fresh("2024-01-01", 10_000))
            .unwrap();
        let config = config(3);
        let mut store =
            CounterStore::open(Box::new(storage.clone()), "2024-01-01", &config).unwrap();
        assert_eq!(storage.write_count(), 0);

        store.apply_delta(1, &config);
        store.apply_delta(1, &config);
        assert_eq!(storage.write_count(), 0);
        store.apply_delta(1, &config);
        assert_eq!(storage.write_count(), 1);
        assert_eq!(storage.stored().unwrap().session_steps, 3);
    }

    #[test]
    fn test_failed_write_is_retried() {
        let storage = MemoryStorage::with_snapshot(&CounterSnapshot::fresh("2024-01-01", 10_000))
            .unwrap();
        let config = config(1);
        let mut store =
            CounterStore::open(Box::new(storage.clone()), "2024-01-01", &config).unwrap();

        storage.set_fail_writes(true).unwrap();
        store.apply_delta(5, &config);
        assert!(store.is_dirty());
        assert_eq!(store.snapshot().session_steps, 5);
        assert!(storage.stored().unwrap().session_steps == 0);

        storage.set_fail_writes(false).unwrap();
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert_eq!(storage.stored().unwrap().session_steps, 5);
    }

    #[test]
    fn test_json_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("steps.json");
        let mut storage = JsonFileStorage::new(&path);
        assert!(storage.load().unwrap().is_none());

        let mut snapshot = CounterSnapshot::fresh("2024-05-05", 8_000);
        snapshot.total_steps = 123_456;
        snapshot.is_tracking = true;
        storage.save(&snapshot).unwrap();

        assert_eq!(storage.load().unwrap(), Some(snapshot));
        assert!(!storage.temp_path().exists());
    }

    #[test]
    fn test_json_file_uses_stable_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.json");
        let mut storage = JsonFileStorage::new(&path);
        storage.save(&CounterSnapshot::fresh("2024-05-05", 8_000)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in [
            "session_steps",
            "daily_steps",
            "total_steps",
            "previous_hardware_reading",
            "is_tracking",
            "start_time",
            "pause_time",
            "last_saved_day",
            "calories_burned",
            "distance_meters",
            "daily_goal",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileStorage::new(&path).load();
        assert!(matches!(result, Err(TrackerError::PersistenceError(_))));
    }
}
