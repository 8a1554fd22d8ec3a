use std::collections::BTreeMap;

use crate::config::DEFAULT_FOLDER;
use crate::db::FileRepository;
use crate::error::AppResult;
use crate::failure_log::FailureLog;
use crate::index::LookupIndex;
use crate::matcher::Matcher;
use crate::models::{FileRecord, Formats};
use crate::storage::{upload_with_retry, MediaHost, RetryPolicy, UploadOptions, UploadedAsset};

/// How derived formats (thumbnail, small, ...) are moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum VariantPolicy {
    /// Every variant points at the primary upload
    #[default]
    Collapse,
    /// Each variant whose own file exists gets a separate upload; the rest
    /// fall back to the primary upload
    UploadEach,
}

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub folder: String,
    pub variant_policy: VariantPolicy,
    /// Match only, without uploading or writing
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            folder: DEFAULT_FOLDER.to_string(),
            variant_policy: VariantPolicy::default(),
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub total: usize,
    /// Records not on local storage
    pub skipped: usize,
    pub succeeded: usize,
    /// Unresolved records plus upload/write failures
    pub failed: usize,
    /// Records without any matching physical file
    pub unresolved: usize,
    /// Dry run only: records that found a file
    pub matched: usize,
}

enum Outcome {
    Migrated(String),
    Matched,
    Unresolved,
}

/// Moves every `local` record to the media host, one record at a time.
/// Records already on the host are skipped, so re-running is safe.
pub struct MigrationService<'a> {
    repo: &'a dyn FileRepository,
    host: &'a dyn MediaHost,
    failure_log: &'a FailureLog,
    options: MigrationOptions,
}

impl<'a> MigrationService<'a> {
    pub fn new(
        repo: &'a dyn FileRepository,
        host: &'a dyn MediaHost,
        failure_log: &'a FailureLog,
        options: MigrationOptions,
    ) -> Self {
        Self {
            repo,
            host,
            failure_log,
            options,
        }
    }

    pub async fn run(&self, index: &LookupIndex) -> AppResult<MigrationSummary> {
        let records = self.repo.find_all().await?;
        let matcher = Matcher::new(index);
        let mut summary = MigrationSummary {
            total: records.len(),
            ..Default::default()
        };

        let local = records.iter().filter(|r| r.is_local()).count();
        tracing::info!(
            "Found {} records ({} local), {} physical files",
            records.len(),
            local,
            index.len()
        );

        for record in &records {
            if !record.is_local() {
                tracing::debug!(
                    "Skipping record {} ({}): provider={}",
                    record.id,
                    record.name,
                    record.provider
                );
                summary.skipped += 1;
                continue;
            }

            tracing::info!("Migrating: {} (id={})", record.name, record.id);
            match self.migrate_record(record, &matcher).await {
                Ok(Outcome::Migrated(url)) => {
                    tracing::info!("Migrated: {} -> {}", record.name, url);
                    summary.succeeded += 1;
                }
                Ok(Outcome::Matched) => summary.matched += 1,
                Ok(Outcome::Unresolved) => {
                    tracing::warn!(
                        "File not found for record {}: name={}, hash={}, url={}",
                        record.id,
                        record.name,
                        record.hash,
                        record.url
                    );
                    summary.unresolved += 1;
                    summary.failed += 1;
                    if !self.options.dry_run {
                        self.failure_log.record(&record.url).await;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Error migrating record {} ({}): {}",
                        record.id,
                        record.name,
                        e
                    );
                    summary.failed += 1;
                    if !self.options.dry_run {
                        self.failure_log.record(&record.url).await;
                    }
                }
            }
        }

        tracing::info!(
            "Migration summary: succeeded={}, failed={} (unresolved={}), skipped={}, total={}",
            summary.succeeded,
            summary.failed,
            summary.unresolved,
            summary.skipped,
            summary.total
        );
        if self.options.dry_run {
            tracing::info!("Dry run: {} of {} local records matched", summary.matched, local);
        }
        Ok(summary)
    }

    async fn migrate_record(&self, record: &FileRecord, matcher: &Matcher<'_>) -> AppResult<Outcome> {
        let Some(found) = matcher.find(record) else {
            return Ok(Outcome::Unresolved);
        };
        tracing::info!(
            "Found record {} at {} via {}",
            record.id,
            found.path.display(),
            found.strategy
        );
        // decoded up front so a malformed record never reaches the host
        let formats = record.formats()?;
        if self.options.dry_run {
            return Ok(Outcome::Matched);
        }

        let options = self.upload_options(&record.hash);
        let primary = upload_with_retry(self.host, &self.options.retry, found.path, &options).await?;
        let variants = match &formats {
            Some(formats) => self.upload_variants(record.id, formats, matcher).await,
            None => BTreeMap::new(),
        };

        let update = record.relocated(&primary, &variants)?;
        self.repo.update_location(record.id, &update).await?;
        Ok(Outcome::Migrated(primary.secure_url))
    }

    /// Separate uploads for variants, if the policy asks for them. A variant
    /// that cannot be found or uploaded collapses onto the primary asset.
    async fn upload_variants(
        &self,
        record_id: i64,
        formats: &Formats,
        matcher: &Matcher<'_>,
    ) -> BTreeMap<String, UploadedAsset> {
        let mut uploaded = BTreeMap::new();
        if self.options.variant_policy != VariantPolicy::UploadEach {
            return uploaded;
        }

        for (key, variant) in formats {
            let Some(path) = matcher.by_url_basename(&variant.url) else {
                tracing::warn!(
                    "Variant {} of record {} not found ({}), using primary upload",
                    key,
                    record_id,
                    variant.url
                );
                continue;
            };
            let options = self.upload_options(variant.hash.as_deref().unwrap_or_default());
            match upload_with_retry(self.host, &self.options.retry, path, &options).await {
                Ok(asset) => {
                    uploaded.insert(key.clone(), asset);
                }
                Err(e) => tracing::warn!(
                    "Variant {} of record {} failed to upload, using primary upload: {}",
                    key,
                    record_id,
                    e
                ),
            }
        }
        uploaded
    }

    fn upload_options(&self, public_id: &str) -> UploadOptions {
        let mut options = UploadOptions::with_public_id(&self.options.folder, public_id);
        if public_id.is_empty() {
            options.public_id = None;
        }
        options
    }
}
