use std::collections::BTreeMap;
use std::path::Path;

use crate::db::FileRepository;
use crate::error::{AppError, AppResult};
use crate::matcher::url_basename;
use crate::models::FileRecord;
use crate::storage::{MediaHost, ResourceType, UploadedAsset};

/// Marker of a URL served from local storage
const LOCAL_URL_MARKER: &str = "/uploads/";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub examined: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Repoints records at assets that were uploaded by filename (public id
/// `<folder>/<hash>`) without touching the files themselves.
pub struct UrlRewriteService<'a> {
    repo: &'a dyn FileRepository,
    host: &'a dyn MediaHost,
    folder: String,
    dry_run: bool,
}

impl<'a> UrlRewriteService<'a> {
    pub fn new(
        repo: &'a dyn FileRepository,
        host: &'a dyn MediaHost,
        folder: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            repo,
            host,
            folder: folder.into(),
            dry_run,
        }
    }

    pub async fn run(&self) -> AppResult<RewriteSummary> {
        let records = self.repo.find_all().await?;
        let mut summary = RewriteSummary::default();

        for record in records.iter().filter(|r| r.url.contains(LOCAL_URL_MARKER)) {
            summary.examined += 1;
            let update = match self
                .remote_asset(record)
                .and_then(|asset| record.relocated(&asset, &BTreeMap::new()))
            {
                Ok(update) => update,
                Err(e) => {
                    tracing::warn!("Cannot rewrite record {} ({}): {}", record.id, record.name, e);
                    summary.failed += 1;
                    continue;
                }
            };

            if self.dry_run {
                tracing::info!("Would update: {} -> {}", record.url, update.url);
                continue;
            }

            match self.repo.update_location(record.id, &update).await {
                Ok(()) => {
                    tracing::info!("Updated: {} -> {}", record.url, update.url);
                    summary.updated += 1;
                }
                Err(e) => {
                    tracing::error!("Error updating record {}: {}", record.id, e);
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "URL rewrite: examined={}, updated={}, failed={}",
            summary.examined,
            summary.updated,
            summary.failed
        );
        Ok(summary)
    }

    /// Where the directory uploader put this record's file
    fn remote_asset(&self, record: &FileRecord) -> AppResult<UploadedAsset> {
        if record.hash.is_empty() {
            return Err(AppError::NotFound("content hash".to_string()));
        }
        let ext = Path::new(url_basename(&record.url))
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let public_id = format!("{}/{}", self.folder, record.hash);
        let resource_type = ResourceType::from_mime(&record.mime);

        Ok(UploadedAsset {
            secure_url: self
                .host
                .delivery_url(&format!("{}{}", public_id, ext), resource_type),
            public_id,
            resource_type: resource_type.to_string(),
        })
    }
}
