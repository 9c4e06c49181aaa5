//! PluginPurge Core Library
//!
//! Discovery, metadata and removal engine for installed audio plugin binaries
//! (VST2 `.dll`, VST3, CLAP, AAX).
//!
//! # Architecture
//!
//! The engine is UI-agnostic. A frontend (the bundled CLI, or a native app
//! through the C ABI in [`ffi`]) drives a [`PurgeEngine`] and renders the rows
//! it returns.
//!
//! ## Discovery (`registry`, `coordinator` modules)
//! - `DirectoryScanner::scan()` - Recursively find plugin files under one root
//! - `ScanCoordinator::scan_all()` - Scan every root on a bounded worker pool,
//!   deduplicate, and atomically publish a new `ScanGeneration`
//!
//! ## Metadata (`metadata` module)
//! - `extract()` - Best-effort vendor/version lookup in the first 4 KiB
//! - `MetadataCache` - Bounded LRU cache scoped to one scan generation
//!
//! ## Search and sort (`index` module)
//! - `PluginIndex::filter()` - Case-insensitive file name search
//! - `PluginIndex::sort_by()` - Stable column sort, toggling direction
//!
//! ## Removal (`operations` module)
//! - `uninstall()` - Delete one plugin file and classify the outcome
//! - `uninstall_batch()` - Remove many, keep going past failures
//! - `spawn_uninstall()` - Run a batch on a background thread
//!
//! ## Configuration (`config` module)
//! - `EngineConfig` - JSON config: roots, extensions, cache size, size ordering
//! - `RootProvider` - Source of root directories, consulted at each scan

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod index;
pub mod metadata;
pub mod operations;
pub mod plugin;
pub mod registry;

pub use config::{EngineConfig, RootProvider, SizeOrder, StaticRoots};
pub use coordinator::{ScanCompletion, ScanCoordinator, ScanGeneration, ScanHandle};
pub use engine::{PurgeEngine, Status};
pub use error::{PurgeError, Result};
pub use index::{PluginIndex, SortKey, ViewState};
pub use metadata::{extract, MetadataCache};
pub use operations::{uninstall, UninstallOutcome, UninstallReport};
pub use plugin::{DisplayRow, PluginRecord, SortColumn};
pub use registry::DirectoryScanner;
