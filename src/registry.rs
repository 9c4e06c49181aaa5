//! Plugin file discovery for a single root directory.
//!
//! A root is any directory that may hold plugin binaries somewhere in its
//! subtree: the standard VST/VST3/CLAP/AAX folders, a user's custom plugin
//! folder, or a vendor's own install directory. Roots are often optional, so a
//! missing root is an ordinary empty result rather than an error.
//!
//! # Platform notes
//!
//! On Windows and Linux plugins are plain files (`.dll`, `.vst3`, `.clap`,
//! `.aax`, `.so`). VST3 and AAX bundles are directories whose actual binaries
//! live further down (`Contents/x86_64-win/Foo.vst3`), which the recursive walk
//! picks up as ordinary files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Enumerates plugin files beneath one root.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    extensions: Vec<String>,
}

impl DirectoryScanner {
    /// `extensions` are matched case-insensitively, with or without a dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns true if `path` carries one of the configured extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }

    /// Recursively collects matching files under `root`, normalized and
    /// without duplicates. Unreadable subtrees are skipped.
    pub fn scan(&self, root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            tracing::debug!(root = %root.display(), "plugin root does not exist, skipping");
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let path = normalize_path(entry.path());
            if seen.insert(path.clone()) {
                found.push(path);
            }
        }

        tracing::debug!(root = %root.display(), count = found.len(), "scanned plugin root");
        found
    }
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXTENSIONS)
    }
}

/// Absolute path with symlinks resolved, so one physical file reached through
/// two roots yields the same key. Falls back to the lexical absolute path
/// when the file cannot be resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Removes repeated paths, keeping the first occurrence of each. Paths are
/// compared as given, so pass them through [`normalize_path`] first.
pub fn dedup_paths<I>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"plugin").unwrap();
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let scanner = DirectoryScanner::default();
        assert!(scanner.scan(&dir.path().join("not-installed")).is_empty());
    }

    #[test]
    fn finds_plugins_recursively_by_extension() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Reverb.dll"));
        touch(&root.join("Vendor/Synth.VST3"));
        touch(&root.join("Vendor/Deep/Nested/Delay.clap"));
        touch(&root.join("Vendor/readme.txt"));
        touch(&root.join("Vendor/license.dll.bak"));

        let scanner = DirectoryScanner::new(["dll", "vst3", "clap"]);
        let mut found: Vec<String> = scanner
            .scan(root)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        found.sort();

        assert_eq!(found, vec!["Delay.clap", "Reverb.dll", "Synth.VST3"]);
    }

    #[test]
    fn results_are_absolute() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.vst3"));
        let found = DirectoryScanner::default().scan(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].is_absolute());
    }

    #[test]
    fn extensions_accept_dots_and_case() {
        let scanner = DirectoryScanner::new([".VST3", "Clap", ""]);
        assert_eq!(scanner.extensions(), &["vst3".to_string(), "clap".to_string()]);
        assert!(scanner.matches(Path::new("x.vst3")));
        assert!(scanner.matches(Path::new("x.CLAP")));
        assert!(!scanner.matches(Path::new("x.dll")));
        assert!(!scanner.matches(Path::new("vst3")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_subdirectory_does_not_duplicate() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("real/x.vst3"));
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        let found = DirectoryScanner::default().scan(root);
        assert_eq!(found.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("ok/a.dll"));
        touch(&root.join("locked/b.dll"));
        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let found = DirectoryScanner::default().scan(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // root ignores permission bits, so both may be visible there
        assert!(found.iter().any(|p| p.ends_with("ok/a.dll")));
        assert!(!found.is_empty() && found.len() <= 2);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let a = PathBuf::from("/plugins/a.dll");
        let b = PathBuf::from("/plugins/b.dll");

        let merged = dedup_paths(vec![a.clone(), b.clone(), a.clone(), b.clone()]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn roots_reaching_one_file_scan_to_equal_keys() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("sub/a.dll"));
        let scanner = DirectoryScanner::default();

        let direct = scanner.scan(&dir.path().join("sub"));
        let via_dot = scanner.scan(&dir.path().join(".").join("sub"));
        let merged = dedup_paths(direct.into_iter().chain(via_dot));
        assert_eq!(merged.len(), 1);
    }
}
