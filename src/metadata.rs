//! Best-effort metadata extraction and its generation-scoped cache.
//!
//! Plugin binaries share no common header, so vendor and version are
//! recovered by searching the start of the file for textual markers such as
//! `Company: ` and `Version: `. Every failure degrades to [`UNKNOWN`].

use crate::plugin::{PluginRecord, UNKNOWN};
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Only this much of each file is ever read.
pub const HEADER_WINDOW: usize = 4096;
/// Bytes taken after a marker before NUL truncation.
pub const FIELD_WINDOW: usize = 41;

const COMPANY_MARKER: &[u8] = b"Company: ";
const AUTHOR_MARKER: &[u8] = b"Author: ";
const VERSION_MARKER: &[u8] = b"Version: ";

/// Builds a record for `path`. Never fails: unreadable files keep the
/// path-derived fields and report `Unknown` vendor and version.
pub fn extract(path: &Path) -> PluginRecord {
    let mut record = PluginRecord::from_path(path);
    record.size_bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let header = match read_header(path) {
        Ok(header) => header,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not read plugin header");
            return record;
        }
    };

    if let Some(vendor) = find_vendor(&header) {
        record.vendor = vendor;
    }
    if let Some(version) = find_field(&header, VERSION_MARKER) {
        record.version = version;
    }
    record
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_WINDOW);
    file.take(HEADER_WINDOW as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// `Company: ` wins unless it is missing or blank, then `Author: ` is tried.
fn find_vendor(header: &[u8]) -> Option<String> {
    find_field(header, COMPANY_MARKER).or_else(|| find_field(header, AUTHOR_MARKER))
}

/// Value following the first occurrence of `marker`, or `None` when the
/// marker is absent or the value is empty or the unknown placeholder.
fn find_field(header: &[u8], marker: &[u8]) -> Option<String> {
    let start = find_subslice(header, marker)? + marker.len();
    let end = (start + FIELD_WINDOW).min(header.len());
    let raw = &header[start..end];
    let raw = match raw.iter().position(|&b| b == 0) {
        Some(nul) => &raw[..nul],
        None => raw,
    };
    let value = String::from_utf8_lossy(raw).into_owned();
    if value.is_empty() || value == UNKNOWN {
        None
    } else {
        Some(value)
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Cache statistics, mostly useful for diagnostics and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub epoch: u64,
}

type Slot = Arc<OnceLock<PluginRecord>>;

struct CacheState {
    epoch: u64,
    entries: LruCache<PathBuf, Slot>,
    hits: u64,
    misses: u64,
}

/// Memoizes [`extract`] per path for one scan generation.
///
/// The lock only guards slot lookup; the file itself is read outside it, so
/// lookups for different paths never wait on each other's I/O. Concurrent
/// lookups for the same path share one slot and the file is read once.
pub struct MetadataCache {
    state: Mutex<CacheState>,
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                epoch: 0,
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Metadata for `path` as seen by generation `epoch`.
    ///
    /// Lookups from a generation other than the cache's current one are
    /// served straight from disk and not stored.
    pub fn get(&self, epoch: u64, path: &Path) -> PluginRecord {
        let slot = {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                None
            } else {
                match state.entries.get(path).cloned() {
                    Some(slot) => {
                        state.hits += 1;
                        Some(slot)
                    }
                    None => {
                        let slot: Slot = Arc::new(OnceLock::new());
                        state.entries.put(path.to_path_buf(), Arc::clone(&slot));
                        state.misses += 1;
                        Some(slot)
                    }
                }
            }
        };

        match slot {
            Some(slot) => slot.get_or_init(|| extract(path)).clone(),
            None => extract(path),
        }
    }

    /// Drops every entry and scopes the cache to generation `epoch`.
    pub fn invalidate_all(&self, epoch: u64) {
        let mut state = self.state.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        state.epoch = epoch;
        state.hits = 0;
        state.misses = 0;
        tracing::debug!(epoch, dropped, "metadata cache invalidated");
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.state.lock().entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
            epoch: state.epoch,
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_CAPACITY)
    }
}
