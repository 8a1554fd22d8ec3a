//! In-memory record store and media host for service tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sqlx::types::Json;

use crate::db::FileRepository;
use crate::error::{AppError, AppResult};
use crate::models::{FileRecord, LocationUpdate};
use crate::storage::{MediaHost, ResourceType, UploadOptions, UploadedAsset};

#[derive(Default)]
pub struct FakeRepository {
    records: Mutex<Vec<FileRecord>>,
    failing_updates: HashSet<i64>,
    pub updates: Mutex<Vec<(i64, LocationUpdate)>>,
}

impl FakeRepository {
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, id: i64) -> Self {
        self.failing_updates.insert(id);
        self
    }

    pub fn record(&self, id: i64) -> FileRecord {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap()
    }
}

#[async_trait::async_trait]
impl FileRepository for FakeRepository {
    async fn find_all(&self) -> AppResult<Vec<FileRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update_location(&self, id: i64, update: &LocationUpdate) -> AppResult<()> {
        if self.failing_updates.contains(&id) {
            return Err(AppError::Database(sqlx::Error::Protocol(format!(
                "write rejected for {}",
                id
            ))));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("file record {}", id)))?;
        record.url = update.url.clone();
        record.provider = update.provider.as_str().to_string();
        record.provider_metadata = Some(Json(update.provider_metadata.to_value()));
        record.formats = update
            .formats
            .as_ref()
            .map(|f| Json(serde_json::to_value(f).unwrap()));
        self.updates.lock().unwrap().push((id, update.clone()));
        Ok(())
    }
}

/// Records every upload; paths listed in `failures` fail that many times
#[derive(Default)]
pub struct FakeHost {
    pub uploads: Mutex<Vec<(PathBuf, UploadOptions)>>,
    failures: Mutex<HashMap<PathBuf, u32>>,
}

impl FakeHost {
    pub fn failing(self, path: impl Into<PathBuf>, times: u32) -> Self {
        self.failures.lock().unwrap().insert(path.into(), times);
        self
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl MediaHost for FakeHost {
    async fn upload(&self, path: &Path, options: &UploadOptions) -> AppResult<UploadedAsset> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), options.clone()));

        if let Some(left) = self.failures.lock().unwrap().get_mut(path) {
            if *left > 0 {
                *left -= 1;
                return Err(AppError::Upload(format!("flaky upload of {}", path.display())));
            }
        }

        let id = options.public_id.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let public_id = format!("{}/{}", options.folder, id);
        Ok(UploadedAsset {
            secure_url: self.delivery_url(&public_id, ResourceType::Image),
            public_id,
            resource_type: "image".to_string(),
        })
    }

    fn delivery_url(&self, public_id: &str, resource_type: ResourceType) -> String {
        format!("https://cdn.test/{}/upload/{}", resource_type, public_id)
    }
}
