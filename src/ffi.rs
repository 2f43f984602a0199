//! FFI bindings for BioScan Vitals
//!
//! This module provides C-compatible functions for driving scan sessions from
//! camera hosts written in other languages. Strings are null-terminated C
//! strings; allocated strings must be freed by the caller using
//! `bioscan_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::{ScanConfig, ScanProfile};
use crate::frame::{FaceMeasurements, FrameReading};
use crate::ledger::HistoryLedger;
use crate::ranker::age_bucket_from_estimate;
use crate::session::{ScanSession, SessionEvent};
use crate::types::WellnessIndex;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

// ============================================================================
// Event codes returned by observe/cancel
// ============================================================================

pub const BIOSCAN_EVENT_ERROR: i32 = -1;
pub const BIOSCAN_EVENT_WAITING: i32 = 0;
pub const BIOSCAN_EVENT_CALIBRATION_STARTED: i32 = 1;
pub const BIOSCAN_EVENT_CALIBRATING: i32 = 2;
pub const BIOSCAN_EVENT_SAMPLING_STARTED: i32 = 3;
pub const BIOSCAN_EVENT_SAMPLE_RECORDED: i32 = 4;
pub const BIOSCAN_EVENT_SAMPLE_REJECTED: i32 = 5;
pub const BIOSCAN_EVENT_ABORTED: i32 = 6;
pub const BIOSCAN_EVENT_COMPLETED: i32 = 7;
pub const BIOSCAN_EVENT_IGNORED: i32 = 8;

fn event_code(event: &SessionEvent) -> i32 {
    match event {
        SessionEvent::Waiting => BIOSCAN_EVENT_WAITING,
        SessionEvent::CalibrationStarted => BIOSCAN_EVENT_CALIBRATION_STARTED,
        SessionEvent::Calibrating => BIOSCAN_EVENT_CALIBRATING,
        SessionEvent::SamplingStarted => BIOSCAN_EVENT_SAMPLING_STARTED,
        SessionEvent::SampleRecorded => BIOSCAN_EVENT_SAMPLE_RECORDED,
        SessionEvent::SampleRejected => BIOSCAN_EVENT_SAMPLE_REJECTED,
        SessionEvent::Aborted { .. } => BIOSCAN_EVENT_ABORTED,
        SessionEvent::Completed(_) => BIOSCAN_EVENT_COMPLETED,
        SessionEvent::Ignored => BIOSCAN_EVENT_IGNORED,
    }
}

// ============================================================================
// Scan Session API
// ============================================================================

/// Opaque handle to a ScanSession
pub struct ScanSessionHandle {
    session: ScanSession,
}

fn into_handle(config: ScanConfig) -> *mut ScanSessionHandle {
    match ScanSession::new(config) {
        Ok(session) => Box::into_raw(Box::new(ScanSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Create a new session for a named profile.
///
/// `profile` is 0 for the standard 15 s scan, 1 for the 6 s heart-rate-only scan.
///
/// # Safety
/// - Returns a pointer to a newly allocated session.
/// - Must be freed with `bioscan_session_free`.
/// - Returns NULL on error; call `bioscan_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bioscan_session_new(profile: i32) -> *mut ScanSessionHandle {
    clear_last_error();

    let profile = match profile {
        0 => ScanProfile::Standard,
        1 => ScanProfile::HeartRateOnly,
        other => {
            set_last_error(&format!("Unknown scan profile {}", other));
            return ptr::null_mut();
        }
    };

    into_handle(profile.config())
}

/// Create a new session from a JSON `ScanConfig`.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string.
/// - Must be freed with `bioscan_session_free`.
/// - Returns NULL on error; call `bioscan_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bioscan_session_new_with_config(
    config_json: *const c_char,
) -> *mut ScanSessionHandle {
    clear_last_error();

    let json_str = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    match ScanConfig::from_json(&json_str) {
        Ok(config) => into_handle(config),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `bioscan_session_new*`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn bioscan_session_free(session: *mut ScanSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Feed one tracker frame to a session.
///
/// When `has_face` is 0 the measurement arguments are ignored and the frame
/// counts as a lost face.
///
/// # Safety
/// - `session` must be a valid pointer returned by `bioscan_session_new*`.
/// - Must not be called concurrently for the same session.
/// - Returns one of the `BIOSCAN_EVENT_*` codes; `BIOSCAN_EVENT_ERROR` on error.
#[no_mangle]
pub unsafe extern "C" fn bioscan_session_observe(
    session: *mut ScanSessionHandle,
    timestamp_ms: u64,
    has_face: i32,
    green_channel_mean: f64,
    nose_vertical_position: f64,
    eye_aspect_distance: f64,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return BIOSCAN_EVENT_ERROR;
    }

    let handle = &mut *session;

    let reading = if has_face != 0 {
        FrameReading::with_face(
            timestamp_ms,
            FaceMeasurements {
                green_channel_mean,
                nose_vertical_position,
                eye_aspect_distance,
            },
        )
    } else {
        FrameReading::no_face(timestamp_ms)
    };

    event_code(&handle.session.observe(&reading))
}

/// Cancel the current attempt, discarding buffered samples.
///
/// # Safety
/// - `session` must be a valid pointer returned by `bioscan_session_new*`.
/// - Returns `BIOSCAN_EVENT_ABORTED`, `BIOSCAN_EVENT_IGNORED` once completed,
///   or `BIOSCAN_EVENT_ERROR`.
#[no_mangle]
pub unsafe extern "C" fn bioscan_session_cancel(session: *mut ScanSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return BIOSCAN_EVENT_ERROR;
    }

    let handle = &mut *session;
    event_code(&handle.session.cancel())
}

/// Fraction of the sampling window elapsed (0-1).
///
/// # Safety
/// - `session` must be a valid pointer returned by `bioscan_session_new*`.
/// - Returns a negative value on error.
#[no_mangle]
pub unsafe extern "C" fn bioscan_session_progress(session: *const ScanSessionHandle) -> f64 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1.0;
    }

    (*session).session.elapsed_fraction()
}

/// Vitals of a completed session as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `bioscan_session_new*`.
/// - Returns a newly allocated string that must be freed with `bioscan_free_string`.
/// - Returns NULL if the session has not completed; call `bioscan_last_error`
///   to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bioscan_session_result_json(
    session: *const ScanSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &*session;

    let vitals = match handle.session.vitals() {
        Ok(vitals) => vitals,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&vitals) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// History Ledger API
// ============================================================================

/// Opaque handle to a file-backed HistoryLedger.
///
/// Ledger calls are internally serialized, so one handle may be shared
/// between threads.
pub struct HistoryLedgerHandle {
    ledger: HistoryLedger,
}

/// Open the history stored at `path`. A missing or unreadable file starts empty.
///
/// # Safety
/// - `path` must be a valid null-terminated C string.
/// - Must be freed with `bioscan_ledger_free`.
/// - Returns NULL on error; call `bioscan_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bioscan_ledger_open(path: *const c_char) -> *mut HistoryLedgerHandle {
    clear_last_error();

    let path_str = match cstr_to_string(path) {
        Some(s) => s,
        None => {
            set_last_error("Invalid path string pointer");
            return ptr::null_mut();
        }
    };

    let ledger = HistoryLedger::open(path_str);
    Box::into_raw(Box::new(HistoryLedgerHandle { ledger }))
}

/// Free a ledger.
///
/// # Safety
/// - `ledger` must be a valid pointer returned by `bioscan_ledger_open`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn bioscan_ledger_free(ledger: *mut HistoryLedgerHandle) {
    if !ledger.is_null() {
        drop(Box::from_raw(ledger));
    }
}

/// Rank a wellness index within its age bucket, then record it.
///
/// # Safety
/// - `ledger` must be a valid pointer returned by `bioscan_ledger_open`.
/// - `age_bucket` must be a valid null-terminated C string.
/// - Returns the percentile (0-100), or -1 on error; call `bioscan_last_error`
///   to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bioscan_ledger_rank_and_record(
    ledger: *const HistoryLedgerHandle,
    age_bucket: *const c_char,
    wellness_index: i64,
) -> i32 {
    clear_last_error();

    if ledger.is_null() {
        set_last_error("Null ledger pointer");
        return -1;
    }

    let handle = &*ledger;

    let bucket = match cstr_to_string(age_bucket) {
        Some(s) => s,
        None => {
            set_last_error("Invalid age bucket string pointer");
            return -1;
        }
    };

    let index = match WellnessIndex::new(wellness_index) {
        Ok(index) => index,
        Err(e) => {
            set_last_error(&e.to_string());
            return -1;
        }
    };

    match handle.ledger.rank_and_record(&bucket, index) {
        Ok(result) => i32::from(result.percentile),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Map an estimated age (`"28"`, `"25-30"`) onto an age bucket label.
///
/// # Safety
/// - `estimate` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `bioscan_free_string`.
/// - Returns NULL when no age can be read; call `bioscan_last_error`.
#[no_mangle]
pub unsafe extern "C" fn bioscan_age_bucket(estimate: *const c_char) -> *mut c_char {
    clear_last_error();

    let estimate_str = match cstr_to_string(estimate) {
        Some(s) => s,
        None => {
            set_last_error("Invalid estimate string pointer");
            return ptr::null_mut();
        }
    };

    match age_bucket_from_estimate(&estimate_str) {
        Some(bucket) => string_to_cstr(&bucket),
        None => {
            set_last_error(&format!("No age in estimate {:?}", estimate_str));
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by BioScan functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a BioScan function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn bioscan_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next BioScan function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn bioscan_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn bioscan_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
