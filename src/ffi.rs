//! FFI bindings for Sketch Prep
//!
//! This module provides C-compatible functions for calling the pipeline from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `sketch_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::PipelineConfig;
use crate::dispatch::PredictionMode;
use crate::error::SketchResult;
use crate::pipeline::{
    parse_strokes, strokes_to_pixels_payload, strokes_to_sequence_payload, SketchProcessor,
};
use crate::types::SurfaceSize;

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

/// Hand a pipeline result across the boundary, recording any error
fn finish(result: SketchResult<String>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Encode a JSON array of strokes into a sequence-mode request body.
///
/// # Safety
/// - `strokes_json` must be a valid null-terminated C string.
/// - `model` may be NULL to use the recurrent model.
/// - Returns a newly allocated string that must be freed with `sketch_free_string`.
/// - Returns NULL on error; call `sketch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn sketch_strokes_to_sequence(
    strokes_json: *const c_char,
    model: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(strokes_json) else {
        set_last_error("Invalid strokes JSON string pointer");
        return ptr::null_mut();
    };
    let model = cstr_to_string(model);

    finish(strokes_to_sequence_payload(&json_str, model.as_deref()))
}

/// Rasterize a JSON array of strokes into a raster-mode request body.
///
/// # Safety
/// - `strokes_json` must be a valid null-terminated C string.
/// - `width` and `height` are the extents of the surface the strokes were
///   drawn on and must be positive.
/// - `model` may be NULL to use the convolutional model.
/// - Returns a newly allocated string that must be freed with `sketch_free_string`.
/// - Returns NULL on error; call `sketch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn sketch_strokes_to_pixels(
    strokes_json: *const c_char,
    width: u32,
    height: u32,
    model: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(strokes_json) else {
        set_last_error("Invalid strokes JSON string pointer");
        return ptr::null_mut();
    };
    let model = cstr_to_string(model);

    finish(strokes_to_pixels_payload(
        &json_str,
        SurfaceSize::new(width, height),
        model.as_deref(),
    ))
}

// ============================================================================
// Configured Processor API
// ============================================================================

/// Opaque handle to a SketchProcessor
pub struct SketchProcessorHandle {
    processor: SketchProcessor,
}

/// Create a processor from a JSON configuration.
///
/// # Safety
/// - `config_json` may be NULL for the default configuration.
/// - Must be freed with `sketch_processor_free`.
/// - Returns NULL on error; call `sketch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn sketch_processor_new(
    config_json: *const c_char,
) -> *mut SketchProcessorHandle {
    clear_last_error();

    let config = match cstr_to_string(config_json) {
        Some(json) => match PipelineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        },
        None => PipelineConfig::default(),
    };

    let handle = Box::new(SketchProcessorHandle {
        processor: SketchProcessor::new(config),
    });
    Box::into_raw(handle)
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `sketch_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn sketch_processor_free(processor: *mut SketchProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Build a request body for strokes in the processor's configured mode.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `sketch_processor_new`.
/// - `strokes_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `sketch_free_string`.
/// - Returns NULL on error; call `sketch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn sketch_processor_request(
    processor: *mut SketchProcessorHandle,
    strokes_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let Some(json_str) = cstr_to_string(strokes_json) else {
        set_last_error("Invalid strokes JSON string pointer");
        return ptr::null_mut();
    };

    let processor = &(*processor).processor;
    let mode: PredictionMode = processor.config().dispatch.mode;
    finish(
        parse_strokes(&json_str)
            .and_then(|strokes| processor.request(mode, &strokes))
            .and_then(|request| request.to_json()),
    )
}

/// Free a string returned by Sketch Prep functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Sketch Prep function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn sketch_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Sketch Prep call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn sketch_last_error() -> *const c_char {
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
pub unsafe extern "C" fn sketch_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_strokes() -> CString {
        CString::new(r#"[
            {"x": [20, 60, 100, 140], "y": [40, 90, 40, 90]},
            {"x": [30, 130], "y": [150, 150]}
        ]"#)
        .unwrap()
    }

    #[test]
    fn test_ffi_strokes_to_sequence() {
        let json = sample_strokes();
        unsafe {
            let result = sketch_strokes_to_sequence(json.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.starts_with(r#"{"sequence":[["#));
            assert!(result_str.ends_with(r#""model":"model2"}"#));

            sketch_free_string(result);
        }
    }

    #[test]
    fn test_ffi_strokes_to_pixels() {
        let json = sample_strokes();
        let model = CString::new("model1").unwrap();
        unsafe {
            let result = sketch_strokes_to_pixels(json.as_ptr(), 200, 200, model.as_ptr());
            assert!(!result.is_null());

            let value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(value["pixels"].as_array().unwrap().len(), 784);
            assert_eq!(value["model"], "model1");

            sketch_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        let config = CString::new(r#"{"dispatch": {"mode": "sequence", "model": "rnn-v3"}}"#).unwrap();
        let json = sample_strokes();
        unsafe {
            let processor = sketch_processor_new(config.as_ptr());
            assert!(!processor.is_null());

            let result = sketch_processor_request(processor, json.as_ptr());
            assert!(!result.is_null());
            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains(r#""model":"rnn-v3""#));
            sketch_free_string(result);

            sketch_processor_free(processor);

            // Default configuration when no JSON is given
            let default_processor = sketch_processor_new(ptr::null());
            assert!(!default_processor.is_null());
            sketch_processor_free(default_processor);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = sketch_strokes_to_sequence(invalid_json.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = sketch_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let empty = CString::new("[]").unwrap();
            assert!(sketch_strokes_to_sequence(empty.as_ptr(), ptr::null()).is_null());
            let error_str = CStr::from_ptr(sketch_last_error()).to_str().unwrap();
            assert!(error_str.contains("no strokes"));

            let bad_config = CString::new(r#"{"round": {"win_threshold": 3}}"#).unwrap();
            assert!(sketch_processor_new(bad_config.as_ptr()).is_null());
            assert!(sketch_strokes_to_sequence(ptr::null(), ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = sketch_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
