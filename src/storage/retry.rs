use std::future::Future;
use std::path::Path;

use tokio::time::{sleep, Duration};

use crate::error::AppResult;

use super::{MediaHost, UploadOptions, UploadedAsset};

/// Fixed-delay retry for flaky upload calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` until it succeeds or `max_attempts` is exhausted,
    /// returning the last error.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        "Retrying {} ({} attempts left): {}",
                        label,
                        self.max_attempts - attempt,
                        e
                    );
                    attempt += 1;
                    sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub async fn upload_with_retry(
    host: &dyn MediaHost,
    policy: &RetryPolicy,
    path: &Path,
    options: &UploadOptions,
) -> AppResult<UploadedAsset> {
    let label = path.display().to_string();
    policy.run(&label, move || host.upload(path, options)).await
}
