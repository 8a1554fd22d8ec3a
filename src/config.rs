use std::env;
use std::path::PathBuf;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{AppError, AppResult};

pub const DEFAULT_UPLOADS_DIR: &str = "public/uploads";
pub const DEFAULT_FOLDER: &str = "strapi-uploads";
pub const DEFAULT_FAILURE_LOG: &str = "failed_uploads.log";

/// Cloudinary account credentials
#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database: PgConnectOptions,
    pub cloudinary: CloudinaryConfig,
    pub uploads_dir: PathBuf,
    pub folder: String,
    pub failure_log: PathBuf,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    /// Missing Cloudinary credentials are a startup failure.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> AppResult<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{} is not set", key)))
        };

        let cloudinary = CloudinaryConfig {
            cloud_name: required("CLOUDINARY_NAME")?,
            api_key: required("CLOUDINARY_KEY")?,
            api_secret: required("CLOUDINARY_SECRET")?,
        };

        let database = match lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .map_err(|e| AppError::Config(format!("DATABASE_URL is invalid: {}", e)))?,
            None => database_from_parts(&lookup),
        };

        Ok(Config {
            database,
            cloudinary,
            uploads_dir: lookup("UPLOADS_DIR")
                .unwrap_or_else(|| DEFAULT_UPLOADS_DIR.to_string())
                .into(),
            folder: lookup("CLOUDINARY_FOLDER").unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            failure_log: lookup("FAILURE_LOG")
                .unwrap_or_else(|| DEFAULT_FAILURE_LOG.to_string())
                .into(),
        })
    }
}

/// Strapi-style connection settings (DATABASE_HOST, DATABASE_PORT, ...).
/// Each part is set on its own so credentials need no escaping.
fn database_from_parts<F>(lookup: &F) -> PgConnectOptions
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("DATABASE_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = lookup("DATABASE_PORT")
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(5432);
    let name = lookup("DATABASE_NAME").unwrap_or_else(|| "strapi".to_string());
    let user = lookup("DATABASE_USERNAME").unwrap_or_else(|| "postgres".to_string());
    let ssl = lookup("DATABASE_SSL").is_some_and(|v| v == "true" || v == "1");

    let mut options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .database(&name)
        .username(&user);
    if let Some(password) = lookup("DATABASE_PASSWORD").filter(|p| !p.is_empty()) {
        options = options.password(&password);
    }
    if ssl {
        options = options.ssl_mode(PgSslMode::Require);
    }
    options
}
