pub mod config;
pub mod db;
pub mod error;
pub mod failure_log;
pub mod index;
pub mod matcher;
pub mod models;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
