//! Concurrent multi-root scanning and generation publishing.
//!
//! Each call to [`ScanCoordinator::scan_all`] starts a background pass that
//! scans every root on a bounded worker pool, merges and deduplicates the
//! results, and publishes them as the new current [`ScanGeneration`]. The
//! caller gets a [`ScanHandle`] right away and receives a [`ScanCompletion`]
//! through it when the pass ends.
//!
//! Passes are numbered by epoch. A pass that finishes after a newer one was
//! requested is discarded, so out-of-order completions never roll the
//! published generation back.

use crate::config::RootProvider;
use crate::error::{PurgeError, Result};
use crate::metadata::MetadataCache;
use crate::registry::{dedup_paths, DirectoryScanner};
use arc_swap::ArcSwap;
use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One consistent snapshot of discovered plugin paths.
#[derive(Debug, Clone)]
pub struct ScanGeneration {
    pub epoch: u64,
    pub paths: Vec<PathBuf>,
    pub roots: Vec<PathBuf>,
    pub completed_at: DateTime<Local>,
}

impl ScanGeneration {
    /// The generation that is current before any scan has finished.
    pub fn empty() -> Self {
        Self {
            epoch: 0,
            paths: Vec::new(),
            roots: Vec::new(),
            completed_at: Local::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Shared slot holding the current generation.
pub type GenerationSlot = Arc<ArcSwap<ScanGeneration>>;

pub fn new_generation_slot() -> GenerationSlot {
    Arc::new(ArcSwap::from_pointee(ScanGeneration::empty()))
}

/// How a scan pass ended.
#[derive(Debug, Clone)]
pub enum ScanCompletion {
    /// The pass was published as the current generation.
    Published {
        generation: Arc<ScanGeneration>,
        count: usize,
    },
    /// A newer pass was requested before this one finished.
    Superseded { epoch: u64 },
}

impl ScanCompletion {
    pub fn count(&self) -> Option<usize> {
        match self {
            ScanCompletion::Published { count, .. } => Some(*count),
            ScanCompletion::Superseded { .. } => None,
        }
    }
}

/// Receiving end of one scan pass.
#[derive(Debug)]
pub struct ScanHandle {
    epoch: u64,
    rx: Receiver<ScanCompletion>,
}

impl ScanHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Blocks until the pass reports.
    pub fn wait(&self) -> Result<ScanCompletion> {
        self.rx
            .recv()
            .map_err(|_| PurgeError::ScanAborted { epoch: self.epoch })
    }

    /// Non-blocking check; `Ok(None)` while the pass is still running.
    pub fn try_wait(&self) -> Result<Option<ScanCompletion>> {
        match self.rx.try_recv() {
            Ok(completion) => Ok(Some(completion)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PurgeError::ScanAborted { epoch: self.epoch }),
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<ScanCompletion>> {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => Ok(Some(completion)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PurgeError::ScanAborted { epoch: self.epoch })
            }
        }
    }
}

/// Fans directory scans out over all roots and publishes the merged result.
#[derive(Clone)]
pub struct ScanCoordinator {
    roots: Arc<dyn RootProvider>,
    scanner: Arc<DirectoryScanner>,
    current: GenerationSlot,
    cache: Arc<MetadataCache>,
    workers: usize,
    latest: Arc<AtomicU64>,
    publish_lock: Arc<Mutex<()>>,
}

impl ScanCoordinator {
    pub fn new(
        roots: Arc<dyn RootProvider>,
        scanner: DirectoryScanner,
        current: GenerationSlot,
        cache: Arc<MetadataCache>,
        workers: usize,
    ) -> Self {
        let latest = current.load().epoch;
        Self {
            roots,
            scanner: Arc::new(scanner),
            current,
            cache,
            workers: workers.max(1),
            latest: Arc::new(AtomicU64::new(latest)),
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The generation currently published.
    pub fn current(&self) -> Arc<ScanGeneration> {
        self.current.load_full()
    }

    /// Starts a scan pass in the background and returns immediately.
    pub fn scan_all(&self) -> ScanHandle {
        let epoch = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = crossbeam_channel::bounded(1);
        let coordinator = self.clone();

        let spawned = thread::Builder::new()
            .name(format!("plugin-scan-{epoch}"))
            .spawn(move || coordinator.run_pass(epoch, tx));
        if let Err(e) = spawned {
            // rx reports ScanAborted once the dropped sender is noticed
            tracing::warn!(epoch, error = %e, "failed to start scan thread");
        }

        ScanHandle { epoch, rx }
    }

    /// Runs a full pass on the calling thread.
    pub fn scan_blocking(&self) -> ScanCompletion {
        let epoch = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let roots = self.roots.roots();
        let paths = self.scan_roots(&roots);
        self.publish(epoch, roots, paths)
    }

    fn run_pass(&self, epoch: u64, tx: Sender<ScanCompletion>) {
        let roots = self.roots.roots();
        tracing::debug!(epoch, roots = roots.len(), "scan started");
        let paths = self.scan_roots(&roots);
        let completion = self.publish(epoch, roots, paths);
        // the handle may have been dropped; nobody is listening then
        let _ = tx.send(completion);
    }

    /// Scans `roots` on at most `workers` threads and merges the results in
    /// completion order.
    fn scan_roots(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        if roots.is_empty() {
            return Vec::new();
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<&Path>();
        for root in roots {
            let _ = job_tx.send(root.as_path());
        }
        drop(job_tx);

        let (found_tx, found_rx) = crossbeam_channel::unbounded::<Vec<PathBuf>>();
        let workers = self.workers.min(roots.len());
        let scanner = self.scanner.as_ref();

        thread::scope(|s| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let found_tx = found_tx.clone();
                s.spawn(move || {
                    for root in job_rx.iter() {
                        let _ = found_tx.send(scanner.scan(root));
                    }
                });
            }
        });
        drop(found_tx);

        dedup_paths(found_rx.iter().flatten())
    }

    /// Swaps in the new generation unless a newer pass was requested or
    /// published in the meantime, then resets the metadata cache.
    fn publish(&self, epoch: u64, roots: Vec<PathBuf>, paths: Vec<PathBuf>) -> ScanCompletion {
        let _guard = self.publish_lock.lock();

        let latest = self.latest.load(Ordering::SeqCst);
        let published = self.current.load().epoch;
        if epoch != latest || epoch <= published {
            tracing::warn!(epoch, latest, "discarding superseded scan");
            return ScanCompletion::Superseded { epoch };
        }

        let generation = Arc::new(ScanGeneration {
            epoch,
            paths,
            roots,
            completed_at: Local::now(),
        });
        let count = generation.len();
        self.current.store(Arc::clone(&generation));
        self.cache.invalidate_all(epoch);
        tracing::info!(epoch, count, "published plugin scan");

        ScanCompletion::Published { generation, count }
    }
}
