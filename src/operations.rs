//! Plugin removal.
//!
//! Removing a plugin deletes exactly one file. Failures are classified and
//! handed back per path so a bulk action can keep going and report a tally;
//! nothing here prompts the user or retries.

use crossbeam_channel::Receiver;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;

/// Result of removing a single plugin file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum UninstallOutcome {
    Success,
    /// The file exists but access control prevents removing it.
    PermissionDenied,
    /// Nothing was there to remove. Not a success.
    NotFound,
    OtherFailure(String),
}

impl UninstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UninstallOutcome::Success)
    }

    /// Maps an I/O error from a removal attempt onto an outcome.
    pub fn from_io_error(error: &io::Error) -> Self {
        match error.kind() {
            ErrorKind::PermissionDenied => UninstallOutcome::PermissionDenied,
            ErrorKind::NotFound => UninstallOutcome::NotFound,
            _ => UninstallOutcome::OtherFailure(error.to_string()),
        }
    }

    /// Numeric code used across the C ABI.
    pub fn code(&self) -> i32 {
        match self {
            UninstallOutcome::Success => 0,
            UninstallOutcome::PermissionDenied => 1,
            UninstallOutcome::NotFound => 2,
            UninstallOutcome::OtherFailure(_) => 3,
        }
    }
}

impl fmt::Display for UninstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UninstallOutcome::Success => write!(f, "removed"),
            UninstallOutcome::PermissionDenied => write!(f, "permission denied"),
            UninstallOutcome::NotFound => write!(f, "file not found"),
            UninstallOutcome::OtherFailure(detail) => write!(f, "{detail}"),
        }
    }
}

/// Per-path outcomes of a bulk uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UninstallReport {
    pub outcomes: Vec<(PathBuf, UninstallOutcome)>,
}

impl UninstallReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &(PathBuf, UninstallOutcome)> {
        self.outcomes.iter().filter(|(_, o)| !o.is_success())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Deletes the plugin file at `path`.
pub fn uninstall(path: &Path) -> UninstallOutcome {
    uninstall_with(path, |p| fs::remove_file(p))
}

/// [`uninstall`] with a caller-supplied removal function.
pub fn uninstall_with<F>(path: &Path, remove: F) -> UninstallOutcome
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    match remove(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "uninstalled plugin");
            UninstallOutcome::Success
        }
        Err(e) => {
            let outcome = UninstallOutcome::from_io_error(&e);
            tracing::warn!(path = %path.display(), error = %e, "failed to uninstall plugin");
            outcome
        }
    }
}

/// Uninstalls every path, continuing past failures.
pub fn uninstall_batch<I, P>(paths: I) -> UninstallReport
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    uninstall_batch_with(paths, |p| fs::remove_file(p))
}

pub fn uninstall_batch_with<I, P, F>(paths: I, mut remove: F) -> UninstallReport
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
    F: FnMut(&Path) -> io::Result<()>,
{
    let outcomes: Vec<_> = paths
        .into_iter()
        .map(|p| {
            let path = p.as_ref();
            (path.to_path_buf(), uninstall_with(path, &mut remove))
        })
        .collect();
    let report = UninstallReport { outcomes };
    tracing::info!(
        requested = report.len(),
        removed = report.success_count(),
        "uninstall batch finished"
    );
    report
}

/// Runs [`uninstall_batch`] on a background thread; the report arrives on
/// the returned channel.
pub fn spawn_uninstall(paths: Vec<PathBuf>) -> io::Result<Receiver<UninstallReport>> {
    spawn_uninstall_with(paths, |p: &Path| fs::remove_file(p))
}

/// [`spawn_uninstall`] with a caller-supplied removal function.
pub fn spawn_uninstall_with<F>(
    paths: Vec<PathBuf>,
    remove: F,
) -> io::Result<Receiver<UninstallReport>>
where
    F: FnMut(&Path) -> io::Result<()> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::Builder::new()
        .name("plugin-uninstall".to_string())
        .spawn(move || {
            let _ = tx.send(uninstall_batch_with(&paths, remove));
        })?;
    Ok(rx)
}

/// The folder a frontend should open to reveal `path`.
pub fn containing_folder(path: &Path) -> Option<PathBuf> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removes_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.dll");
        fs::write(&path, b"x").unwrap();

        assert_eq!(uninstall(&path), UninstallOutcome::Success);
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let outcome = uninstall(&dir.path().join("never.vst3"));
        assert_eq!(outcome, UninstallOutcome::NotFound);
        assert!(!outcome.is_success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn directory_is_other_failure() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Bundle.vst3");
        fs::create_dir(&bundle).unwrap();

        assert!(matches!(uninstall(&bundle), UninstallOutcome::OtherFailure(_)));
        assert!(bundle.exists());
    }

    #[test]
    fn classifies_io_errors() {
        let denied = io::Error::from(ErrorKind::PermissionDenied);
        let missing = io::Error::from(ErrorKind::NotFound);
        let other = io::Error::new(ErrorKind::Other, "disk on fire");

        assert_eq!(UninstallOutcome::from_io_error(&denied), UninstallOutcome::PermissionDenied);
        assert_eq!(UninstallOutcome::from_io_error(&missing), UninstallOutcome::NotFound);
        assert_eq!(
            UninstallOutcome::from_io_error(&other),
            UninstallOutcome::OtherFailure("disk on fire".to_string())
        );
    }

    #[test]
    fn batch_continues_past_failures() {
        let dir = tempdir().unwrap();
        let paths: Vec<_> = ["a.dll", "b.dll", "c.dll"]
            .iter()
            .map(|n| dir.path().join(n))
            .collect();
        for path in &paths {
            fs::write(path, b"x").unwrap();
        }
        let locked = paths[1].clone();

        let report = uninstall_batch_with(&paths, |p| {
            if p == locked {
                Err(io::Error::from(ErrorKind::PermissionDenied))
            } else {
                fs::remove_file(p)
            }
        });

        assert_eq!(report.len(), 3);
        assert_eq!(report.success_count(), 2);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, locked);
        assert_eq!(failures[0].1, UninstallOutcome::PermissionDenied);
        assert!(locked.exists());
    }

    #[test]
    fn background_batch_reports_through_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bg.clap");
        fs::write(&path, b"x").unwrap();

        let rx = spawn_uninstall(vec![path.clone(), dir.path().join("missing.clap")]).unwrap();
        let report = rx.recv().unwrap();
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.outcomes[1].1, UninstallOutcome::NotFound);
    }

    #[test]
    fn containing_folder_is_parent() {
        assert_eq!(
            containing_folder(Path::new("/plugins/vst3/a.vst3")),
            Some(PathBuf::from("/plugins/vst3"))
        );
        assert_eq!(containing_folder(Path::new("a.vst3")), None);
        assert_eq!(containing_folder(Path::new("/")), None);
    }

    #[test]
    fn outcome_codes_are_distinct() {
        let codes: Vec<i32> = [
            UninstallOutcome::Success,
            UninstallOutcome::PermissionDenied,
            UninstallOutcome::NotFound,
            UninstallOutcome::OtherFailure(String::new()),
        ]
        .iter()
        .map(UninstallOutcome::code)
        .collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
    }
}
