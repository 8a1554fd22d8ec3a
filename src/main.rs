use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strapi_media_migrate::config::Config;
use strapi_media_migrate::db::{create_pool, PgFileRepository};
use strapi_media_migrate::failure_log::FailureLog;
use strapi_media_migrate::index::LookupIndex;
use strapi_media_migrate::services::{
    migration_status, DirectoryUploadService, MigrationOptions, MigrationService,
    UrlRewriteService, VariantPolicy,
};
use strapi_media_migrate::storage::{CloudinaryBackend, RetryPolicy};

#[derive(Parser)]
#[command(version, about = "Move Strapi media uploads to Cloudinary")]
struct Cli {
    /// Local uploads root (defaults to UPLOADS_DIR or public/uploads)
    #[arg(long, global = true)]
    uploads_dir: Option<PathBuf>,

    /// Cloudinary folder (defaults to CLOUDINARY_FOLDER or strapi-uploads)
    #[arg(long, global = true)]
    folder: Option<String>,

    /// Failure log (defaults to FAILURE_LOG or failed_uploads.log)
    #[arg(long, global = true)]
    failure_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload every local file record and repoint it at Cloudinary
    Migrate {
        #[arg(long, value_enum, default_value_t = VariantPolicy::Collapse)]
        variants: VariantPolicy,

        /// Only report which file each record would use
        #[arg(long)]
        dry_run: bool,
    },
    /// Upload all images under the uploads root and archive them into _processed
    UploadDir,
    /// Show how many records are still on local storage
    Status,
    /// Point /uploads/ URLs at assets already uploaded by hash
    RewriteUrls {
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strapi_media_migrate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(dir) = cli.uploads_dir {
        config.uploads_dir = dir;
    }
    if let Some(folder) = cli.folder {
        config.folder = folder;
    }
    if let Some(path) = cli.failure_log {
        config.failure_log = path;
    }

    let host = CloudinaryBackend::new(config.cloudinary.clone())
        .context("Failed to create Cloudinary client")?;
    let failure_log = FailureLog::new(&config.failure_log);

    if let Command::UploadDir = cli.command {
        DirectoryUploadService::new(&host, &failure_log, &config.folder, RetryPolicy::default())
            .run(&config.uploads_dir)
            .await?;
        return Ok(());
    }

    tracing::info!("Connecting to database...");
    let pool = create_pool(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection established");
    let repo = PgFileRepository::new(pool.clone());

    let result = async {
        match cli.command {
            Command::Migrate { variants, dry_run } => {
                let index = LookupIndex::build(&config.uploads_dir)?;
                let options = MigrationOptions {
                    folder: config.folder.clone(),
                    variant_policy: variants,
                    dry_run,
                    retry: RetryPolicy::default(),
                };
                MigrationService::new(&repo, &host, &failure_log, options)
                    .run(&index)
                    .await?;
            }
            Command::Status => {
                let report = migration_status(&repo).await?;
                for (id, name) in &report.still_local {
                    println!("STILL LOCAL: {} (id={})", name, id);
                }
                println!(
                    "local={} cloudinary={} other={} total={}",
                    report.local, report.cloudinary, report.other, report.total
                );
            }
            Command::RewriteUrls { dry_run } => {
                UrlRewriteService::new(&repo, &host, &config.folder, dry_run)
                    .run()
                    .await?;
            }
            Command::UploadDir => {}
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    pool.close().await;
    result
}
