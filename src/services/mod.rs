pub mod directory_upload;
pub mod migration_service;
pub mod status_service;
pub mod url_rewrite_service;

pub use directory_upload::{DirectoryUploadService, DirectoryUploadSummary};
pub use migration_service::{MigrationOptions, MigrationService, MigrationSummary, VariantPolicy};
pub use status_service::{migration_status, StatusReport};
pub use url_rewrite_service::{RewriteSummary, UrlRewriteService};

#[cfg(test)]
pub(crate) mod testing;
