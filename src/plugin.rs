use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Placeholder for any metadata field the extractor could not recover.
pub const UNKNOWN: &str = "Unknown";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One discovered plugin binary.
///
/// Records are immutable snapshots: a rescan produces fresh records rather
/// than updating the ones handed out for a previous generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub path: PathBuf,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub size_bytes: u64,
    pub format: String,
}

impl PluginRecord {
    /// A record carrying only what can be derived from the path itself.
    pub fn from_path(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            name: base_name(path).into_owned(),
            vendor: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            size_bytes: 0,
            format: format_of(path),
        }
    }

    /// Stable row key for frontends, derived from the path.
    pub fn id(&self) -> String {
        format!("{:x}", md5::compute(self.path.to_string_lossy().as_bytes()))
    }

    pub fn formatted_size(&self) -> String {
        format_size(self.size_bytes)
    }

    /// The string a table would show in `column`.
    pub fn column_value(&self, column: SortColumn) -> Cow<'_, str> {
        match column {
            SortColumn::Name => Cow::Borrowed(&self.name),
            SortColumn::Vendor => Cow::Borrowed(&self.vendor),
            SortColumn::Version => Cow::Borrowed(&self.version),
            SortColumn::Size => Cow::Owned(self.formatted_size()),
            SortColumn::Format => Cow::Borrowed(&self.format),
            SortColumn::Path => self.path.to_string_lossy(),
        }
    }

    pub fn display_row(&self) -> DisplayRow {
        DisplayRow {
            name: self.name.clone(),
            vendor: self.vendor.clone(),
            version: self.version.clone(),
            size: self.formatted_size(),
            format: self.format.clone(),
            path: self.path.to_string_lossy().into_owned(),
        }
    }
}

/// A record rendered to the strings a presentation layer displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRow {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub size: String,
    pub format: String,
    pub path: String,
}

/// Columns of the plugin table, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Name,
    Vendor,
    Version,
    Size,
    Format,
    Path,
}

impl SortColumn {
    pub const ALL: [SortColumn; 6] = [
        SortColumn::Name,
        SortColumn::Vendor,
        SortColumn::Version,
        SortColumn::Size,
        SortColumn::Format,
        SortColumn::Path,
    ];

    /// Column for a zero-based table position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortColumn::Name => "Name",
            SortColumn::Vendor => "Vendor",
            SortColumn::Version => "Version",
            SortColumn::Size => "Size",
            SortColumn::Format => "Format",
            SortColumn::Path => "Path",
        };
        f.write_str(label)
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortColumn::Name),
            "vendor" | "company" => Ok(SortColumn::Vendor),
            "version" => Ok(SortColumn::Version),
            "size" => Ok(SortColumn::Size),
            "format" => Ok(SortColumn::Format),
            "path" => Ok(SortColumn::Path),
            other => Err(format!(
                "unknown column '{other}' (expected name, vendor, version, size, format or path)"
            )),
        }
    }
}

/// Renders a byte count the way the plugin table shows it, e.g. `"12.50 MB"`.
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// File name including extension, as stored on disk.
pub fn base_name(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or(Cow::Borrowed(""))
}

/// Extension uppercased without the leading dot, empty when there is none.
pub fn format_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}
