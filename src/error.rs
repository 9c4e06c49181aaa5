//! Error types for the ambient surfaces of the engine.
//!
//! Scanning, extraction and listing never fail; they degrade to partial or
//! default results. Uninstall failures are classified per file in
//! [`UninstallOutcome`](crate::operations::UninstallOutcome). What remains are
//! configuration problems and background workers that fail to start or
//! disappear without reporting.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("failed to read config file {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The background scan ended without sending its completion.
    #[error("scan {epoch} aborted before reporting completion")]
    ScanAborted { epoch: u64 },

    #[error("failed to start background uninstall: {0}")]
    UninstallSpawn(#[source] std::io::Error),

    /// The background uninstall ended without sending its report.
    #[error("uninstall of {requested} plugin(s) aborted before reporting")]
    UninstallAborted { requested: usize },
}

pub type Result<T> = std::result::Result<T, PurgeError>;
