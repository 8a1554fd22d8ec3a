use crate::db::FileRepository;
use crate::error::AppResult;
use crate::models::Provider;

/// Provider breakdown of the files table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub total: usize,
    pub local: usize,
    pub cloudinary: usize,
    pub other: usize,
    /// (id, name) of every record still on local storage
    pub still_local: Vec<(i64, String)>,
}

impl StatusReport {
    pub fn is_complete(&self) -> bool {
        self.local == 0
    }
}

pub async fn migration_status(repo: &dyn FileRepository) -> AppResult<StatusReport> {
    let records = repo.find_all().await?;
    let mut report = StatusReport {
        total: records.len(),
        ..Default::default()
    };

    for record in &records {
        match record.provider() {
            Provider::Local => {
                tracing::warn!("Still local: {} (id={})", record.name, record.id);
                report.local += 1;
                report.still_local.push((record.id, record.name.clone()));
            }
            Provider::Cloudinary => {
                tracing::debug!("Cloudinary: {} -> {}", record.name, record.url);
                report.cloudinary += 1;
            }
            Provider::Other(tag) => {
                tracing::debug!("Provider {}: {}", tag, record.name);
                report.other += 1;
            }
        }
    }

    tracing::info!(
        "Migration status: total={}, local={}, cloudinary={}, other={}",
        report.total,
        report.local,
        report.cloudinary,
        report.other
    );
    if report.is_complete() {
        tracing::info!("All files migrated");
    }
    Ok(report)
}
