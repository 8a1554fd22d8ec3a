use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{AppError, AppResult};
use crate::failure_log::FailureLog;
use crate::storage::{upload_with_retry, MediaHost, RetryPolicy, UploadOptions};

/// Sibling directory that receives files after a successful upload
pub const PROCESSED_DIR: &str = "_processed";

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryUploadSummary {
    pub uploaded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Uploads every image under the uploads root by filename, then archives
/// it into `_processed` so a rerun only sees what is left.
pub struct DirectoryUploadService<'a> {
    host: &'a dyn MediaHost,
    failure_log: &'a FailureLog,
    folder: String,
    retry: RetryPolicy,
}

impl<'a> DirectoryUploadService<'a> {
    pub fn new(
        host: &'a dyn MediaHost,
        failure_log: &'a FailureLog,
        folder: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            host,
            failure_log,
            folder: folder.into(),
            retry,
        }
    }

    pub async fn run(&self, root: &Path) -> AppResult<DirectoryUploadSummary> {
        if !root.is_dir() {
            return Err(AppError::NotFound(format!(
                "uploads directory {}",
                root.display()
            )));
        }

        tracing::info!("Starting upload of {}", root.display());
        let options = UploadOptions::with_filename(&self.folder);
        let mut summary = DirectoryUploadSummary::default();

        for path in collect_files(root) {
            if !is_image(&path) {
                tracing::info!("Skipping non-image file: {}", path.display());
                summary.skipped += 1;
                continue;
            }

            match upload_with_retry(self.host, &self.retry, &path, &options).await {
                Ok(asset) => {
                    tracing::info!("Uploaded: {} => {}", path.display(), asset.secure_url);
                    summary.uploaded += 1;
                    if let Err(e) = archive(&path).await {
                        tracing::warn!("Uploaded but could not archive {}: {}", path.display(), e);
                    }
                }
                Err(e) => {
                    tracing::error!("Error uploading {}: {}", path.display(), e);
                    summary.failed += 1;
                    self.failure_log.record(&path.display().to_string()).await;
                }
            }
        }

        tracing::info!(
            "Upload complete: uploaded={}, failed={}, skipped={} (failures in {})",
            summary.uploaded,
            summary.failed,
            summary.skipped,
            self.failure_log.path().display()
        );
        Ok(summary)
    }
}

/// Files under `root` in name order, leaving out archived ones.
/// Unreadable entries are logged and skipped.
fn collect_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == PROCESSED_DIR));

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e),
        }
    }
    files
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|i| i.eq_ignore_ascii_case(ext)))
}

/// Moves `path` into `<parent>/_processed/`, keeping the file as a backup
async fn archive(path: &Path) -> AppResult<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| AppError::NotFound(format!("file name of {}", path.display())))?;
    let processed = parent.join(PROCESSED_DIR);
    tokio::fs::create_dir_all(&processed).await?;
    let destination = processed.join(name);
    tokio::fs::rename(path, &destination).await?;
    Ok(destination)
}
