use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::AppResult;

/// Append-only list of entries (one per line) that need manual follow-up
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &str) -> AppResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", entry.trim_end()).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    /// Appends without failing the caller; a broken log only costs a warning
    pub async fn record(&self, entry: &str) {
        if let Err(e) = self.append(entry).await {
            tracing::warn!(
                "Could not write to failure log {}: {} (entry: {})",
                self.path.display(),
                e,
                entry
            );
        }
    }

    /// Entries written so far; a missing file reads as empty
    pub async fn entries(&self) -> AppResult<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
