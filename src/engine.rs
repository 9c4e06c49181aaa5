//! The engine a frontend talks to.
//!
//! [`PurgeEngine`] wires the root provider, scanner, coordinator, metadata
//! cache and index together and exposes the commands a plugin table needs:
//! refresh, filter, sort, uninstall and reveal-in-folder. Long-running work
//! (scans and bulk uninstalls) happens off the calling thread; the frontend
//! decides whether to wait or poll.

use crate::config::{EngineConfig, RootProvider};
use crate::coordinator::{new_generation_slot, ScanCompletion, ScanCoordinator, ScanHandle};
use crate::error::{PurgeError, Result};
use crate::index::{PluginIndex, SortKey};
use crate::metadata::MetadataCache;
use crate::operations::{self, UninstallReport};
use crate::plugin::{DisplayRow, PluginRecord, SortColumn};
use crate::registry::DirectoryScanner;
use crossbeam_channel::{Receiver, TryRecvError};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What the status bar should say after the latest operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Total(usize),
    Displaying(usize),
    Uninstalling(usize),
    Uninstalled(usize),
    NothingSelected,
    Cancelled,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Ready"),
            Status::Loading => write!(f, "Loading plugins..."),
            Status::Total(n) => write!(f, "Total plugins: {n}"),
            Status::Displaying(n) => write!(f, "Displaying {n} plugins"),
            Status::Uninstalling(n) => write!(f, "Uninstalling {n} plugin(s)..."),
            Status::Uninstalled(n) => write!(f, "Uninstalled {n} plugin(s)"),
            Status::NothingSelected => write!(f, "No plugins selected"),
            Status::Cancelled => write!(f, "Uninstall cancelled"),
        }
    }
}

pub struct PurgeEngine {
    coordinator: ScanCoordinator,
    index: PluginIndex,
    cache: Arc<MetadataCache>,
    pending: Option<ScanHandle>,
    uninstalling: Option<PendingUninstall>,
    status: Status,
}

struct PendingUninstall {
    requested: usize,
    rx: Receiver<UninstallReport>,
}

impl PurgeEngine {
    /// Builds an engine scanning the roots described by `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_roots(config, Arc::new(config.root_provider()))
    }

    /// Builds an engine with an explicit root provider.
    pub fn with_roots(config: &EngineConfig, roots: Arc<dyn RootProvider>) -> Self {
        let cache = Arc::new(MetadataCache::new(config.cache_capacity));
        let current = new_generation_slot();
        let coordinator = ScanCoordinator::new(
            roots,
            DirectoryScanner::new(&config.extensions),
            Arc::clone(&current),
            Arc::clone(&cache),
            config.workers(),
        );
        let index = PluginIndex::new(current, Arc::clone(&cache), config.size_order);

        Self {
            coordinator,
            index,
            cache,
            pending: None,
            uninstalling: None,
            status: Status::Idle,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn index(&self) -> &PluginIndex {
        &self.index
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn is_scanning(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts a fresh scan. Any scan still running is superseded and its
    /// result will be discarded.
    pub fn refresh(&mut self) -> &ScanHandle {
        self.status = Status::Loading;
        self.pending.insert(self.coordinator.scan_all())
    }

    /// Polls the pending scan without blocking. Returns the plugin count once
    /// the scan has been published.
    pub fn poll_scan(&mut self) -> Result<Option<usize>> {
        let Some(handle) = self.pending.as_ref() else {
            return Ok(None);
        };
        match handle.try_wait() {
            Ok(Some(completion)) => {
                self.pending = None;
                Ok(self.complete(completion))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.pending = None;
                Err(e)
            }
        }
    }

    /// Blocks until the pending scan finishes. Returns the plugin count, or
    /// `None` when no scan was pending or it was superseded.
    pub fn wait_for_scan(&mut self) -> Result<Option<usize>> {
        let Some(handle) = self.pending.take() else {
            return Ok(None);
        };
        let completion = handle.wait()?;
        Ok(self.complete(completion))
    }

    /// Starts a scan and waits for it.
    pub fn refresh_blocking(&mut self) -> Result<usize> {
        self.refresh();
        let count = self.wait_for_scan()?;
        Ok(count.unwrap_or_else(|| self.index.len()))
    }

    fn complete(&mut self, completion: ScanCompletion) -> Option<usize> {
        let count = completion.count()?;
        self.status = Status::Total(count);
        Some(count)
    }

    pub fn set_filter(&mut self, text: &str) -> Vec<PluginRecord> {
        self.index.set_filter(text);
        let view = self.index.view();
        self.status = Status::Displaying(view.len());
        view
    }

    /// Sorts by `column`; repeating the same column flips the direction.
    pub fn sort_by(&mut self, column: SortColumn) -> SortKey {
        self.index.sort_by(column)
    }

    pub fn view(&self) -> Vec<PluginRecord> {
        self.index.view()
    }

    pub fn rows(&self) -> Vec<DisplayRow> {
        self.view().iter().map(PluginRecord::display_row).collect()
    }

    /// Starts removing `paths` on a background thread once `confirm`
    /// approves the count. Returns `Ok(false)` when nothing was selected or
    /// the caller declined.
    ///
    /// Collect the report with [`poll_uninstall`](Self::poll_uninstall) or
    /// [`wait_for_uninstall`](Self::wait_for_uninstall); a rescan starts as
    /// soon as it arrives. A batch still running when another one starts is
    /// detached and its report dropped.
    pub fn start_uninstall<F>(&mut self, paths: Vec<PathBuf>, confirm: F) -> Result<bool>
    where
        F: FnOnce(usize) -> bool,
    {
        self.start_uninstall_with(paths, confirm, |p: &Path| std::fs::remove_file(p))
    }

    /// [`start_uninstall`](Self::start_uninstall) with a custom removal
    /// function.
    pub fn start_uninstall_with<F, R>(
        &mut self,
        paths: Vec<PathBuf>,
        confirm: F,
        remove: R,
    ) -> Result<bool>
    where
        F: FnOnce(usize) -> bool,
        R: FnMut(&Path) -> io::Result<()> + Send + 'static,
    {
        if paths.is_empty() {
            self.status = Status::NothingSelected;
            return Ok(false);
        }
        if !confirm(paths.len()) {
            self.status = Status::Cancelled;
            return Ok(false);
        }

        let requested = paths.len();
        let rx = operations::spawn_uninstall_with(paths, remove)
            .map_err(PurgeError::UninstallSpawn)?;
        self.uninstalling = Some(PendingUninstall { requested, rx });
        self.status = Status::Uninstalling(requested);
        Ok(true)
    }

    pub fn is_uninstalling(&self) -> bool {
        self.uninstalling.is_some()
    }

    /// Polls the running uninstall without blocking. Returns the report once
    /// the batch has finished.
    pub fn poll_uninstall(&mut self) -> Result<Option<UninstallReport>> {
        let Some(pending) = self.uninstalling.as_ref() else {
            return Ok(None);
        };
        match pending.rx.try_recv() {
            Ok(report) => {
                self.uninstalling = None;
                Ok(Some(self.finish_uninstall(report)))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                let requested = pending.requested;
                self.uninstalling = None;
                Err(PurgeError::UninstallAborted { requested })
            }
        }
    }

    /// Blocks until the running uninstall reports. `None` when no batch was
    /// running.
    pub fn wait_for_uninstall(&mut self) -> Result<Option<UninstallReport>> {
        let Some(pending) = self.uninstalling.take() else {
            return Ok(None);
        };
        let report = pending.rx.recv().map_err(|_| PurgeError::UninstallAborted {
            requested: pending.requested,
        })?;
        Ok(Some(self.finish_uninstall(report)))
    }

    fn finish_uninstall(&mut self, report: UninstallReport) -> UninstallReport {
        self.pending = Some(self.coordinator.scan_all());
        self.status = Status::Uninstalled(report.success_count());
        report
    }

    /// Runs [`start_uninstall`](Self::start_uninstall) and waits for the
    /// report. The follow-up rescan is left pending; wait on it with
    /// [`wait_for_scan`](Self::wait_for_scan) or [`poll_scan`](Self::poll_scan).
    pub fn uninstall_selected<F>(
        &mut self,
        paths: &[PathBuf],
        confirm: F,
    ) -> Result<Option<UninstallReport>>
    where
        F: FnOnce(usize) -> bool,
    {
        if !self.start_uninstall(paths.to_vec(), confirm)? {
            return Ok(None);
        }
        self.wait_for_uninstall()
    }

    pub fn containing_folder(&self, path: &Path) -> Option<PathBuf> {
        operations::containing_folder(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticRoots;
    use std::fs;
    use tempfile::tempdir;

    fn engine_for(root: &Path) -> PurgeEngine {
        let config = EngineConfig {
            include_default_roots: false,
            scan_workers: Some(2),
            ..EngineConfig::default()
        };
        PurgeEngine::with_roots(&config, Arc::new(StaticRoots(vec![root.to_path_buf()])))
    }

    #[test]
    fn status_messages_carry_counts() {
        assert_eq!(Status::Total(4).to_string(), "Total plugins: 4");
        assert_eq!(Status::Displaying(2).to_string(), "Displaying 2 plugins");
        assert_eq!(Status::Uninstalled(1).to_string(), "Uninstalled 1 plugin(s)");
        assert_eq!(Status::Uninstalling(3).to_string(), "Uninstalling 3 plugin(s)...");
    }

    #[test]
    fn refresh_then_filter_updates_status() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Alpha.dll"), b"Company: Acme\0").unwrap();
        fs::write(dir.path().join("Beta.vst3"), b"").unwrap();
        let mut engine = engine_for(dir.path());

        assert_eq!(engine.refresh_blocking().unwrap(), 2);
        assert_eq!(engine.status(), Status::Total(2));
        assert!(!engine.is_scanning());

        let view = engine.set_filter("alp");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].vendor, "Acme");
        assert_eq!(engine.status(), Status::Displaying(1));
    }

    #[test]
    fn poll_eventually_reports_completion() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.clap"), b"").unwrap();
        let mut engine = engine_for(dir.path());

        engine.refresh();
        assert_eq!(engine.status(), Status::Loading);
        let count = loop {
            if let Some(count) = engine.poll_scan().unwrap() {
                break count;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        assert_eq!(count, 1);
        assert_eq!(engine.poll_scan().unwrap(), None);
    }

    #[test]
    fn declined_or_empty_uninstall_does_nothing() {
        let dir = tempdir().unwrap();
        let plugin = dir.path().join("keep.dll");
        fs::write(&plugin, b"").unwrap();
        let mut engine = engine_for(dir.path());

        assert!(engine.uninstall_selected(&[], |_| true).unwrap().is_none());
        assert_eq!(engine.status(), Status::NothingSelected);

        let mut asked = 0;
        let started = engine
            .start_uninstall(vec![plugin.clone()], |n| {
                asked = n;
                false
            })
            .unwrap();
        assert!(!started);
        assert!(!engine.is_uninstalling());
        assert_eq!(asked, 1);
        assert_eq!(engine.status(), Status::Cancelled);
        assert!(plugin.exists());
    }

    #[test]
    fn background_uninstall_reports_then_rescans() {
        let dir = tempdir().unwrap();
        let plugin = dir.path().join("gone.dll");
        fs::write(&plugin, b"").unwrap();
        let mut engine = engine_for(dir.path());
        assert_eq!(engine.refresh_blocking().unwrap(), 1);

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let started = engine
            .start_uninstall_with(vec![plugin.clone()], |_| true, move |p: &Path| {
                let _ = release_rx.recv();
                fs::remove_file(p)
            })
            .unwrap();
        assert!(started);
        assert_eq!(engine.status(), Status::Uninstalling(1));
        // the batch is parked on the release channel, so the caller was not blocked
        assert!(engine.poll_uninstall().unwrap().is_none());
        assert!(engine.is_uninstalling());
        assert!(!engine.is_scanning());

        release_tx.send(()).unwrap();
        let report = loop {
            if let Some(report) = engine.poll_uninstall().unwrap() {
                break report;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        assert_eq!(report.success_count(), 1);
        assert_eq!(engine.status(), Status::Uninstalled(1));
        assert!(!engine.is_uninstalling());
        assert!(engine.is_scanning());
        assert_eq!(engine.wait_for_scan().unwrap(), Some(0));
        assert!(engine.poll_uninstall().unwrap().is_none());
    }

    #[test]
    fn containing_folder_passes_through() {
        let engine = engine_for(Path::new("/nonexistent"));
        assert_eq!(
            engine.containing_folder(Path::new("/a/b/c.vst3")),
            Some(PathBuf::from("/a/b"))
        );
    }
}
