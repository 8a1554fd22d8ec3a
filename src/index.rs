use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{AppError, AppResult};

/// Filename-to-path lookup over every file under the uploads root.
/// Paths are kept in lexicographic order so matching is reproducible
/// regardless of the filesystem's directory order.
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    paths: Vec<PathBuf>,
    keys: HashMap<String, PathBuf>,
}

impl LookupIndex {
    /// Walks `root` recursively. A missing root is fatal; entries that
    /// cannot be read (symlink loops, permissions) are logged and skipped.
    pub fn build(root: &Path) -> AppResult<Self> {
        if !root.is_dir() {
            return Err(AppError::NotFound(format!(
                "uploads directory {}",
                root.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() {
                paths.push(entry.into_path());
            }
        }

        let index = Self::from_paths(paths);
        tracing::info!(
            "Indexed {} physical files under {}",
            index.len(),
            root.display()
        );
        Ok(index)
    }

    /// Builds the key map from an arbitrary path list. On key collisions the
    /// lexicographically first path wins.
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        paths.dedup();

        let mut keys = HashMap::new();
        for path in &paths {
            if let Some(name) = file_name(path) {
                keys.entry(name.to_string()).or_insert_with(|| path.clone());
            }
            if let Some(stem) = file_stem(path) {
                keys.entry(stem.to_string()).or_insert_with(|| path.clone());
            }
        }

        Self { paths, keys }
    }

    /// Path registered under a filename or filename-without-extension key
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.keys.get(key).map(PathBuf::as_path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub(crate) fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

pub(crate) fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|n| n.to_str())
}
