//! FFI bindings for the step tracker
//!
//! C-compatible functions for driving a [`TrackerHandle`] from a mobile host.
//! Strings are null-terminated; strings returned by this module must be freed
//! with `steps_free_string`. Functions returning `i32` use 0 for success and
//! -1 for failure, with the message available from `steps_last_error`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;

use crate::config::TrackerConfig;
use crate::engine::TrackerHandle;
use crate::error::TrackerError;
use crate::tracker::Command;
use crate::types::{MotionSample, SensorPath};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn status(result: Result<(), TrackerError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Tracker lifecycle
// ============================================================================

/// Opaque handle to a running tracker
pub struct StepsTrackerHandle {
    handle: TrackerHandle,
}

/// Open a tracker persisting to `state_path`.
///
/// `config_json` may be NULL for defaults. The sensor flags describe the
/// device; with neither present the tracker opens in the unavailable state.
///
/// # Safety
/// - `state_path` must be a valid null-terminated C string.
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a handle that must be released with `steps_tracker_close`.
/// - Returns NULL on error; call `steps_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_open(
    state_path: *const c_char,
    config_json: *const c_char,
    has_step_counter: bool,
    has_accelerometer: bool,
) -> *mut StepsTrackerHandle {
    clear_last_error();

    let path = match cstr_to_string(state_path) {
        Some(s) => PathBuf::from(s),
        None => {
            set_last_error("Invalid state path pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        TrackerConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match TrackerConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let sensor_path = SensorPath::select(has_step_counter, has_accelerometer);
    match TrackerHandle::open(&path, config, sensor_path) {
        Ok(handle) => Box::into_raw(Box::new(StepsTrackerHandle { handle })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Stop the tracker, flushing its counters, and free the handle.
///
/// # Safety
/// - `tracker` must be NULL or a pointer returned by `steps_tracker_open`.
/// - After calling this function, the pointer is invalid.
/// - Returns 0 on success, -1 if the final flush failed.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_close(tracker: *mut StepsTrackerHandle) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        return 0;
    }
    let boxed = Box::from_raw(tracker);
    status(boxed.handle.shutdown().map(|_| ()))
}

/// 1 when a step source is present, 0 when tracking is unavailable.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_is_available(tracker: *const StepsTrackerHandle) -> i32 {
    if tracker.is_null() {
        return 0;
    }
    i32::from((*tracker).handle.is_available())
}

// ============================================================================
// Sensor input
// ============================================================================

/// Enqueue a raw hardware step counter reading.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_push_hardware(
    tracker: *const StepsTrackerHandle,
    raw: u32,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    status((*tracker).handle.push_hardware_reading(raw))
}

/// Enqueue an accelerometer sample (m/s², epoch milliseconds).
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_push_motion(
    tracker: *const StepsTrackerHandle,
    x: f32,
    y: f32,
    z: f32,
    timestamp: i64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    let sample = MotionSample::new(x, y, z, timestamp);
    status((*tracker).handle.push_motion_sample(sample))
}

// ============================================================================
// Commands
// ============================================================================

unsafe fn send_command(tracker: *const StepsTrackerHandle, command: Command) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    status((*tracker).handle.command(command))
}

/// Start a new session.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_start(tracker: *const StepsTrackerHandle) -> i32 {
    send_command(tracker, Command::Start)
}

/// Pause the running session.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_pause(tracker: *const StepsTrackerHandle) -> i32 {
    send_command(tracker, Command::Pause)
}

/// Resume a paused session.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_resume(tracker: *const StepsTrackerHandle) -> i32 {
    send_command(tracker, Command::Resume)
}

/// End the session without clearing its counters.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_stop(tracker: *const StepsTrackerHandle) -> i32 {
    send_command(tracker, Command::Stop)
}

/// Zero the session counters.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_reset_session(tracker: *const StepsTrackerHandle) -> i32 {
    send_command(tracker, Command::ResetSession)
}

/// Zero the session and daily counters.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_reset_all(tracker: *const StepsTrackerHandle) -> i32 {
    send_command(tracker, Command::ResetAll)
}

/// Set the daily step goal. A goal of 0 is ignored by the tracker.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_set_daily_goal(
    tracker: *const StepsTrackerHandle,
    goal: u32,
) -> i32 {
    send_command(tracker, Command::SetDailyGoal(goal))
}

// ============================================================================
// Queries
// ============================================================================

/// Current counters as a JSON object.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `steps_tracker_open`.
/// - Returns a newly allocated string that must be freed with `steps_free_string`.
/// - Returns NULL on error; call `steps_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn steps_tracker_snapshot(tracker: *const StepsTrackerHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    match (*tracker).handle.current_snapshot().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `steps_` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn steps_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `steps_` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn steps_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn steps_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CounterSnapshot;
    use std::ffi::CString;

    fn state_path(dir: &tempfile::TempDir) -> CString {
        let path = dir.path().join("steps.json");
        CString::new(path.to_str().unwrap()).unwrap()
    }

    unsafe fn read_snapshot(tracker: *const StepsTrackerHandle) -> CounterSnapshot {
        let json = steps_tracker_snapshot(tracker);
        assert!(!json.is_null());
        let snapshot = CounterSnapshot::from_json(CStr::from_ptr(json).to_str().unwrap()).unwrap();
        steps_free_string(json);
        snapshot
    }

    #[test]
    fn test_ffi_tracker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);

        unsafe {
            let tracker = steps_tracker_open(path.as_ptr(), ptr::null(), true, true);
            assert!(!tracker.is_null());
            assert_eq!(steps_tracker_is_available(tracker), 1);

            assert_eq!(steps_tracker_start(tracker), 0);
            for raw in [300, 340, 390] {
                assert_eq!(steps_tracker_push_hardware(tracker, raw), 0);
            }
            assert_eq!(steps_tracker_set_daily_goal(tracker, 5_000), 0);
            assert_eq!(steps_tracker_close(tracker), 0);

            // Reopen from the state file
            let tracker = steps_tracker_open(path.as_ptr(), ptr::null(), true, true);
            assert!(!tracker.is_null());
            let snapshot = read_snapshot(tracker);
            assert_eq!(snapshot.session_steps, 90);
            assert_eq!(snapshot.total_steps, 390);
            assert_eq!(snapshot.daily_goal, 5_000);
            assert!(snapshot.is_tracking);

            assert_eq!(steps_tracker_pause(tracker), 0);
            assert_eq!(steps_tracker_close(tracker), 0);
        }
    }

    #[test]
    fn test_ffi_custom_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        let config = CString::new(r#"{"default_daily_goal": 8000}"#).unwrap();

        unsafe {
            let tracker = steps_tracker_open(path.as_ptr(), config.as_ptr(), true, false);
            assert!(!tracker.is_null());
            assert_eq!(read_snapshot(tracker).daily_goal, 8_000);
            assert_eq!(steps_tracker_close(tracker), 0);
        }
    }

    #[test]
    fn test_ffi_unavailable_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);

        unsafe {
            let tracker = steps_tracker_open(path.as_ptr(), ptr::null(), false, false);
            assert!(!tracker.is_null());
            assert_eq!(steps_tracker_is_available(tracker), 0);

            assert_eq!(steps_tracker_start(tracker), 0);
            assert_eq!(steps_tracker_close(tracker), 0);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        let bad_config = CString::new("not json").unwrap();

        unsafe {
            let tracker = steps_tracker_open(path.as_ptr(), bad_config.as_ptr(), true, true);
            assert!(tracker.is_null());

            let error = steps_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            assert_eq!(steps_tracker_start(ptr::null()), -1);
            assert!(steps_tracker_snapshot(ptr::null()).is_null());
            assert_eq!(steps_tracker_close(ptr::null_mut()), 0);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = steps_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
