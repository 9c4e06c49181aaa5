//! Engine configuration and root directory providers.
//!
//! Configuration is a JSON document in which every field is optional:
//!
//! ```json
//! {
//!   "roots": ["D:\\Audio\\VST"],
//!   "include_default_roots": true,
//!   "extensions": ["dll", "vst3", "clap"],
//!   "cache_capacity": 1000,
//!   "scan_workers": 4,
//!   "size_order": "numeric"
//! }
//! ```

use crate::error::{PurgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSIONS: [&str; 4] = ["dll", "vst3", "clap", "aax"];
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// How the Size column is ordered.
///
/// `Formatted` compares the displayed `"N.NN MB"` strings, so `"10.00 MB"`
/// sorts before `"9.00 MB"`. That is how the legacy uninstaller behaved and it
/// stays the default; `Numeric` compares byte counts instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeOrder {
    #[default]
    Formatted,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra root directories scanned in addition to the platform defaults.
    pub roots: Vec<PathBuf>,
    pub include_default_roots: bool,
    /// Plugin file extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    pub cache_capacity: usize,
    /// Scan worker count; `None` uses the available parallelism.
    pub scan_workers: Option<usize>,
    pub size_order: SizeOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            include_default_roots: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            scan_workers: None,
            size_order: SizeOrder::default(),
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| PurgeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: EngineConfig =
            serde_json::from_str(&content).map_err(|source| PurgeError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.normalize();
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Lowercases extensions and strips leading dots so `".VST3"` matches.
    pub fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.extensions = self
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty() && seen.insert(e.clone()))
            .collect();
        self.cache_capacity = self.cache_capacity.max(1);
        self.scan_workers = self.scan_workers.map(|n| n.max(1));
    }

    pub fn workers(&self) -> usize {
        self.scan_workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// The root provider this configuration describes.
    pub fn root_provider(&self) -> StaticRoots {
        let mut roots = Vec::new();
        if self.include_default_roots {
            roots.extend(default_plugin_roots());
        }
        roots.extend(self.roots.iter().cloned());
        StaticRoots(roots)
    }
}

/// Supplies the directories to scan at the start of every pass.
pub trait RootProvider: Send + Sync {
    fn roots(&self) -> Vec<PathBuf>;
}

/// A fixed list of roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRoots(pub Vec<PathBuf>);

impl RootProvider for StaticRoots {
    fn roots(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

impl<F> RootProvider for F
where
    F: Fn() -> Vec<PathBuf> + Send + Sync,
{
    fn roots(&self) -> Vec<PathBuf> {
        self()
    }
}

/// Returns the standard audio plugin directories for the current platform.
///
/// Windows: Program Files and Common Files locations for VST2, VST3, CLAP and AAX.
/// macOS: system-wide (/Library) and user (~/Library) Plug-Ins folders.
/// Linux: the per-user dot directories plus /usr/lib and /usr/local/lib.
pub fn default_plugin_roots() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        for base in [r"C:\Program Files", r"C:\Program Files (x86)"] {
            dirs.push(PathBuf::from(format!(r"{base}\VSTPlugins")));
            dirs.push(PathBuf::from(format!(r"{base}\Steinberg\VSTPlugins")));
            dirs.push(PathBuf::from(format!(r"{base}\Common Files\VST2")));
            dirs.push(PathBuf::from(format!(r"{base}\Common Files\VST3")));
            dirs.push(PathBuf::from(format!(r"{base}\Common Files\CLAP")));
            dirs.push(PathBuf::from(format!(r"{base}\Common Files\Avid\Audio\Plug-Ins")));
        }
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            dirs.push(PathBuf::from(format!(r"{local}\Programs\Common\VST3")));
            dirs.push(PathBuf::from(format!(r"{local}\Programs\Common\CLAP")));
        }
    }

    #[cfg(target_os = "macos")]
    {
        let system = PathBuf::from("/Library/Audio/Plug-Ins");
        for kind in ["Components", "VST", "VST3", "CLAP"] {
            dirs.push(system.join(kind));
        }
        if let Ok(home) = std::env::var("HOME") {
            let user = PathBuf::from(home).join("Library/Audio/Plug-Ins");
            for kind in ["Components", "VST", "VST3", "CLAP"] {
                dirs.push(user.join(kind));
            }
        }
        dirs.push(PathBuf::from("/Library/Application Support/Avid/Audio/Plug-Ins"));
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Ok(home) = std::env::var("HOME") {
            let home = PathBuf::from(home);
            dirs.push(home.join(".vst"));
            dirs.push(home.join(".vst3"));
            dirs.push(home.join(".clap"));
        }
        for prefix in ["/usr/lib", "/usr/local/lib"] {
            for kind in ["vst", "vst3", "clap"] {
                dirs.push(Path::new(prefix).join(kind));
            }
        }
    }

    dirs
}
