// Remote media host abstraction (Cloudinary)

pub mod cloudinary;
pub mod retry;

pub use cloudinary::CloudinaryBackend;
pub use retry::{upload_with_retry, RetryPolicy};

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::AppResult;

/// Resource type hint sent with an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// Let the host detect the type from the file contents
    Auto,
    Image,
    Video,
    Raw,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Auto => "auto",
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Raw => "raw",
        }
    }

    /// Delivery type for an already stored asset, derived from its MIME type
    pub fn from_mime(mime: &str) -> Self {
        if mime.contains("video") {
            ResourceType::Video
        } else {
            ResourceType::Image
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub folder: String,
    /// Desired public id; the host derives one when `None`
    pub public_id: Option<String>,
    pub resource_type: ResourceType,
    pub use_filename: bool,
    pub unique_filename: bool,
}

impl UploadOptions {
    /// Upload keyed by the record's content hash
    pub fn with_public_id(folder: &str, public_id: &str) -> Self {
        Self {
            folder: folder.to_string(),
            public_id: Some(public_id.to_string()),
            resource_type: ResourceType::Auto,
            use_filename: false,
            unique_filename: true,
        }
    }

    /// Upload keyed by the original filename
    pub fn with_filename(folder: &str) -> Self {
        Self {
            folder: folder.to_string(),
            public_id: None,
            resource_type: ResourceType::Auto,
            use_filename: true,
            unique_filename: false,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedAsset {
    pub secure_url: String,
    pub public_id: String,
    pub resource_type: String,
}

/// Remote upload host
#[async_trait::async_trait]
pub trait MediaHost: Send + Sync {
    /// Uploads a local file
    async fn upload(&self, path: &Path, options: &UploadOptions) -> AppResult<UploadedAsset>;

    /// Public delivery URL of an asset that is already stored on the host
    fn delivery_url(&self, public_id: &str, resource_type: ResourceType) -> String;
}
