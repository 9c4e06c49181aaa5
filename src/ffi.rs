//! FFI (Foreign Function Interface) bindings for native frontends.
//!
//! Exposes a [`PurgeEngine`] through C-compatible functions callable from
//! Swift (macOS) and C# (Windows).
//!
//! # Memory Management
//!
//! - Rust allocates memory and returns pointers to Swift/C#
//! - The calling code MUST call the corresponding `_free` functions to prevent leaks
//! - Strings are null-terminated UTF-8
//!
//! # Threading
//!
//! `pluginpurge_refresh` blocks until the scan is published. Call it from a
//! background queue/task, never from the UI thread. An engine handle must not
//! be used from two threads at once.
//!
//! # Usage from Swift (macOS)
//!
//! ```swift
//! let engine = pluginpurge_engine_new(nil)
//! defer { pluginpurge_engine_free(engine) }
//!
//! let count = pluginpurge_refresh(engine)
//! for i in 0..<pluginpurge_view_count(engine) {
//!     let row = pluginpurge_view_get(engine, i)
//!     // Use row data...
//!     pluginpurge_free_row(row)
//! }
//! ```

use crate::config::EngineConfig;
use crate::engine::PurgeEngine;
use crate::operations::{self, UninstallOutcome};
use crate::plugin::{PluginRecord, SortColumn};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::ptr;

/// Opaque engine handle with the last rendered view.
pub struct CEngine {
    engine: PurgeEngine,
    view: Vec<PluginRecord>,
}

impl CEngine {
    fn reload_view(&mut self) -> c_int {
        self.view = self.engine.view();
        self.view.len() as c_int
    }
}

/// C-compatible table row.
#[repr(C)]
pub struct CPluginRow {
    pub name: *mut c_char,
    pub vendor: *mut c_char,
    pub version: *mut c_char,
    pub size: *mut c_char,
    pub format: *mut c_char,
    pub path: *mut c_char,
    pub size_bytes: u64,
}

/// Returned by `pluginpurge_uninstall` when the arguments are invalid.
pub const INVALID_ARGUMENT: c_int = -1;

// ============================================================================
// Engine Lifecycle
// ============================================================================

/// Create an engine. `config_path` may be null for defaults.
/// Returns null if the config file cannot be loaded.
/// Caller MUST call pluginpurge_engine_free() when done.
#[no_mangle]
pub extern "C" fn pluginpurge_engine_new(config_path: *const c_char) -> *mut CEngine {
    let path = if config_path.is_null() {
        None
    } else {
        match unsafe { c_char_to_path(config_path) } {
            Some(path) => Some(path),
            None => return ptr::null_mut(),
        }
    };

    match EngineConfig::load_or_default(path.as_deref()) {
        Ok(config) => Box::into_raw(Box::new(CEngine {
            engine: PurgeEngine::new(&config),
            view: Vec::new(),
        })),
        Err(e) => {
            tracing::error!(error = %e, "failed to create engine");
            ptr::null_mut()
        }
    }
}

/// Free an engine created by pluginpurge_engine_new().
#[no_mangle]
pub extern "C" fn pluginpurge_engine_free(engine: *mut CEngine) {
    if !engine.is_null() {
        unsafe {
            let _ = Box::from_raw(engine);
        }
    }
}

// ============================================================================
// Scanning and View
// ============================================================================

/// Rescan all roots, blocking until the new generation is published.
/// Returns the number of rows in the refreshed view, or -1 on error.
#[no_mangle]
pub extern "C" fn pluginpurge_refresh(engine: *mut CEngine) -> c_int {
    let Some(handle) = (unsafe { engine.as_mut() }) else {
        return -1;
    };
    match handle.engine.refresh_blocking() {
        Ok(_) => handle.reload_view(),
        Err(e) => {
            tracing::error!(error = %e, "refresh failed");
            -1
        }
    }
}

/// Set the search text (null clears it). Returns the number of matching rows.
#[no_mangle]
pub extern "C" fn pluginpurge_set_filter(engine: *mut CEngine, text: *const c_char) -> c_int {
    let Some(handle) = (unsafe { engine.as_mut() }) else {
        return 0;
    };
    let text = if text.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    };
    handle.engine.set_filter(&text);
    handle.reload_view()
}

/// Sort by column index (0=Name, 1=Vendor, 2=Version, 3=Size, 4=Format, 5=Path).
/// Repeating a column flips direction. Returns 1 if now descending, 0 if
/// ascending, -1 for an invalid column.
#[no_mangle]
pub extern "C" fn pluginpurge_sort_by(engine: *mut CEngine, column: c_int) -> c_int {
    let Some(handle) = (unsafe { engine.as_mut() }) else {
        return -1;
    };
    let Some(column) = usize::try_from(column).ok().and_then(SortColumn::from_index) else {
        return -1;
    };
    let key = handle.engine.sort_by(column);
    handle.reload_view();
    key.reverse as c_int
}

/// Number of rows in the current view.
#[no_mangle]
pub extern "C" fn pluginpurge_view_count(engine: *const CEngine) -> c_int {
    match unsafe { engine.as_ref() } {
        Some(handle) => handle.view.len() as c_int,
        None => 0,
    }
}

/// Row at `index` of the current view.
/// Caller MUST call pluginpurge_free_row() when done.
#[no_mangle]
pub extern "C" fn pluginpurge_view_get(engine: *const CEngine, index: c_int) -> *mut CPluginRow {
    let Some(handle) = (unsafe { engine.as_ref() }) else {
        return ptr::null_mut();
    };
    let Some(record) = usize::try_from(index).ok().and_then(|i| handle.view.get(i)) else {
        return ptr::null_mut();
    };

    let row = record.display_row();
    Box::into_raw(Box::new(CPluginRow {
        name: string_to_c_char(&row.name),
        vendor: string_to_c_char(&row.vendor),
        version: string_to_c_char(&row.version),
        size: string_to_c_char(&row.size),
        format: string_to_c_char(&row.format),
        path: string_to_c_char(&row.path),
        size_bytes: record.size_bytes,
    }))
}

/// Free a row returned by pluginpurge_view_get().
#[no_mangle]
pub extern "C" fn pluginpurge_free_row(row: *mut CPluginRow) {
    if !row.is_null() {
        unsafe {
            let r = Box::from_raw(row);
            free_c_char(r.name);
            free_c_char(r.vendor);
            free_c_char(r.version);
            free_c_char(r.size);
            free_c_char(r.format);
            free_c_char(r.path);
        }
    }
}

// ============================================================================
// Plugin Operations
// ============================================================================

/// Delete one plugin file. The frontend is responsible for confirming with
/// the user first and for calling pluginpurge_refresh() afterwards.
/// Returns 0=Success, 1=PermissionDenied, 2=NotFound, 3=OtherFailure,
/// -1 for a null or non-UTF-8 path.
#[no_mangle]
pub extern "C" fn pluginpurge_uninstall(path: *const c_char) -> c_int {
    if path.is_null() {
        return INVALID_ARGUMENT;
    }
    match unsafe { c_char_to_path(path) } {
        Some(path) => {
            let outcome: UninstallOutcome = operations::uninstall(&path);
            outcome.code()
        }
        None => INVALID_ARGUMENT,
    }
}

/// Folder containing the plugin at `path`, for "Open Folder" actions.
/// Caller MUST call pluginpurge_free_string() when done.
#[no_mangle]
pub extern "C" fn pluginpurge_containing_folder(path: *const c_char) -> *mut c_char {
    if path.is_null() {
        return ptr::null_mut();
    }
    unsafe { c_char_to_path(path) }
        .as_deref()
        .and_then(operations::containing_folder)
        .map(|folder| string_to_c_char(&folder.to_string_lossy()))
        .unwrap_or(ptr::null_mut())
}

// ============================================================================
// String Management
// ============================================================================

/// Free a string returned by FFI functions.
#[no_mangle]
pub extern "C" fn pluginpurge_free_string(s: *mut c_char) {
    free_c_char(s);
}

// ============================================================================
// Helper Functions
// ============================================================================

/// # Safety
/// `s` must be a valid, non-null, null-terminated string.
unsafe fn c_char_to_path(s: *const c_char) -> Option<PathBuf> {
    CStr::from_ptr(s).to_str().ok().map(|s| Path::new(s).to_path_buf())
}

fn string_to_c_char(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn free_c_char(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn c_path(path: &Path) -> CString {
        CString::new(path.to_str().unwrap()).unwrap()
    }

    unsafe fn read(s: *mut c_char) -> String {
        CStr::from_ptr(s).to_string_lossy().into_owned()
    }

    #[test]
    fn null_handles_are_tolerated() {
        assert_eq!(pluginpurge_refresh(ptr::null_mut()), -1);
        assert_eq!(pluginpurge_view_count(ptr::null()), 0);
        assert!(pluginpurge_view_get(ptr::null(), 0).is_null());
        assert_eq!(pluginpurge_sort_by(ptr::null_mut(), 0), -1);
        assert_eq!(pluginpurge_uninstall(ptr::null()), INVALID_ARGUMENT);
        assert!(pluginpurge_containing_folder(ptr::null()).is_null());
        pluginpurge_engine_free(ptr::null_mut());
        pluginpurge_free_row(ptr::null_mut());
        pluginpurge_free_string(ptr::null_mut());
    }

    #[test]
    fn engine_round_trip_through_c_abi() {
        let dir = tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        fs::create_dir(&plugins).unwrap();
        fs::write(plugins.join("Bass.dll"), b"Company: Low End\0Version: 2.1\0").unwrap();
        fs::write(plugins.join("Arp.vst3"), b"").unwrap();
        let config_path = dir.path().join("config.json");
        let config = serde_json::json!({
            "roots": [plugins],
            "include_default_roots": false,
        });
        fs::write(&config_path, config.to_string()).unwrap();

        let config_c = c_path(&config_path);
        let engine = pluginpurge_engine_new(config_c.as_ptr());
        assert!(!engine.is_null());

        assert_eq!(pluginpurge_refresh(engine), 2);
        assert_eq!(pluginpurge_sort_by(engine, 0), 0);
        assert_eq!(pluginpurge_sort_by(engine, 0), 1);
        assert_eq!(pluginpurge_sort_by(engine, 42), -1);

        let row = pluginpurge_view_get(engine, 0);
        assert!(!row.is_null());
        unsafe {
            assert_eq!(read((*row).name), "Bass.dll");
            assert_eq!(read((*row).vendor), "Low End");
            assert_eq!(read((*row).version), "2.1");
            assert_eq!(read((*row).format), "DLL");
        }
        pluginpurge_free_row(row);
        assert!(pluginpurge_view_get(engine, 2).is_null());

        let filter = CString::new("arp").unwrap();
        assert_eq!(pluginpurge_set_filter(engine, filter.as_ptr()), 1);
        assert_eq!(pluginpurge_set_filter(engine, ptr::null()), 2);

        let bass = c_path(&plugins.join("Bass.dll"));
        assert_eq!(pluginpurge_uninstall(bass.as_ptr()), 0);
        assert_eq!(pluginpurge_uninstall(bass.as_ptr()), 2);
        assert_eq!(pluginpurge_refresh(engine), 1);

        pluginpurge_engine_free(engine);
    }

    #[test]
    fn bad_config_yields_null_engine() {
        let dir = tempdir().unwrap();
        let missing = c_path(&dir.path().join("nope.json"));
        assert!(pluginpurge_engine_new(missing.as_ptr()).is_null());
    }

    #[test]
    fn containing_folder_string() {
        let path = CString::new("/plugins/vst3/a.vst3").unwrap();
        let folder = pluginpurge_containing_folder(path.as_ptr());
        assert_eq!(unsafe { read(folder) }, "/plugins/vst3");
        pluginpurge_free_string(folder);
    }
}
