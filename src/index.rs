//! Search and sort over the current scan generation.

use crate::config::SizeOrder;
use crate::coordinator::{GenerationSlot, ScanGeneration};
use crate::metadata::MetadataCache;
use crate::plugin::{base_name, PluginRecord, SortColumn};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

/// Active search text and sort order of the plugin table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub search: String,
    pub sort: Option<SortKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: SortColumn,
    pub reverse: bool,
}

/// Read side of the plugin set.
///
/// Holds no records itself: the current generation is loaded from the shared
/// slot on every call and metadata comes from the cache, so a view is always
/// built from one generation even while a newer one is being published.
pub struct PluginIndex {
    current: GenerationSlot,
    cache: Arc<MetadataCache>,
    size_order: SizeOrder,
    state: ViewState,
}

impl PluginIndex {
    pub fn new(current: GenerationSlot, cache: Arc<MetadataCache>, size_order: SizeOrder) -> Self {
        Self {
            current,
            cache,
            size_order,
            state: ViewState::default(),
        }
    }

    pub fn generation(&self) -> Arc<ScanGeneration> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn size_order(&self) -> SizeOrder {
        self.size_order
    }

    /// Every record of the current generation, in generation order.
    pub fn records(&self) -> Vec<PluginRecord> {
        let generation = self.generation();
        self.resolve(&generation, generation.paths.iter())
    }

    /// Records whose file name contains `substring`, ignoring case. The path
    /// and extracted metadata are not searched.
    pub fn filter(&self, substring: &str) -> Vec<PluginRecord> {
        let generation = self.generation();
        let matching = filter_paths(&generation.paths, substring);
        self.resolve(&generation, matching.into_iter())
    }

    /// The filtered view sorted by `column`, without touching the view state.
    pub fn sort(&self, column: SortColumn, reverse: bool) -> Vec<PluginRecord> {
        let mut records = self.filter(&self.state.search);
        sort_records(&mut records, column, reverse, self.size_order);
        records
    }

    pub fn set_filter(&mut self, text: &str) {
        self.state.search = text.to_string();
    }

    /// Sorts by `column`, flipping direction when it is already the active
    /// column and starting ascending otherwise. Returns the new key.
    pub fn sort_by(&mut self, column: SortColumn) -> SortKey {
        let key = match self.state.sort {
            Some(active) if active.column == column => SortKey {
                column,
                reverse: !active.reverse,
            },
            _ => SortKey {
                column,
                reverse: false,
            },
        };
        self.state.sort = Some(key);
        key
    }

    /// The table as it should currently be displayed.
    pub fn view(&self) -> Vec<PluginRecord> {
        let mut records = self.filter(&self.state.search);
        if let Some(key) = self.state.sort {
            sort_records(&mut records, key.column, key.reverse, self.size_order);
        }
        records
    }

    fn resolve<'a, I>(&self, generation: &ScanGeneration, paths: I) -> Vec<PluginRecord>
    where
        I: Iterator<Item = &'a PathBuf>,
    {
        paths
            .map(|path| self.cache.get(generation.epoch, path))
            .collect()
    }
}

/// Paths whose base name contains `substring`, case-insensitively.
pub fn filter_paths<'a>(paths: &'a [PathBuf], substring: &str) -> Vec<&'a PathBuf> {
    if substring.is_empty() {
        return paths.iter().collect();
    }
    let needle = substring.to_lowercase();
    paths
        .iter()
        .filter(|p| base_name(p).to_lowercase().contains(&needle))
        .collect()
}

/// Stable sort by the displayed value of `column`. Descending order keeps
/// equal keys in their original relative order too.
pub fn sort_records(
    records: &mut [PluginRecord],
    column: SortColumn,
    reverse: bool,
    size_order: SizeOrder,
) {
    let compare = |a: &PluginRecord, b: &PluginRecord| -> Ordering {
        if column == SortColumn::Size && size_order == SizeOrder::Numeric {
            a.size_bytes.cmp(&b.size_bytes)
        } else {
            a.column_value(column).cmp(&b.column_value(column))
        }
    };

    if reverse {
        records.sort_by(|a, b| compare(b, a));
    } else {
        records.sort_by(compare);
    }
}
