use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::error::AppResult;
use crate::storage::UploadedAsset;

/// Derived renditions keyed by format name (thumbnail, small, medium, large)
pub type Formats = BTreeMap<String, FormatVariant>;

/// Row of the Strapi `files` table (collection `plugin::upload.file`)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub hash: String,
    pub ext: Option<String>,
    pub mime: String,
    pub url: String,
    /// Raw `formats` column, decoded per record by [`FileRecord::formats`]
    pub formats: Option<Json<serde_json::Value>>,
    pub provider: String,
    pub provider_metadata: Option<Json<serde_json::Value>>,
}

/// One derived rendition. Attributes other than the location ones
/// (width, height, size, path, ...) are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatVariant {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub public_id: String,
    pub resource_type: String,
}

impl ProviderMetadata {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "public_id": self.public_id,
            "resource_type": self.resource_type,
        })
    }
}

impl From<&UploadedAsset> for ProviderMetadata {
    fn from(asset: &UploadedAsset) -> Self {
        Self {
            public_id: asset.public_id.clone(),
            resource_type: asset.resource_type.clone(),
        }
    }
}

/// Provider tag stored in `files.provider`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Local,
    Cloudinary,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Provider::Local => "local",
            Provider::Cloudinary => "cloudinary",
            Provider::Other(tag) => tag,
        }
    }
}

impl From<&str> for Provider {
    fn from(tag: &str) -> Self {
        match tag {
            "local" => Provider::Local,
            "cloudinary" => Provider::Cloudinary,
            other => Provider::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every location field of a record, written in a single statement so the
/// primary URL and the variants can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub url: String,
    pub provider: Provider,
    pub provider_metadata: ProviderMetadata,
    pub formats: Option<Formats>,
}

impl FileRecord {
    pub fn provider(&self) -> Provider {
        Provider::from(self.provider.as_str())
    }

    pub fn is_local(&self) -> bool {
        self.provider() == Provider::Local
    }

    /// Decodes the derived renditions. A malformed `formats` value only
    /// fails this record.
    pub fn formats(&self) -> AppResult<Option<Formats>> {
        match &self.formats {
            Some(Json(value)) => Ok(Some(Formats::deserialize(value)?)),
            None => Ok(None),
        }
    }

    /// Builds the update that moves this record onto `primary`.
    /// Variants listed in `variant_assets` point at their own upload; every
    /// other variant is collapsed onto the primary asset.
    pub fn relocated(
        &self,
        primary: &UploadedAsset,
        variant_assets: &BTreeMap<String, UploadedAsset>,
    ) -> AppResult<LocationUpdate> {
        let formats = self.formats()?.map(|formats| {
            formats
                .into_iter()
                .map(|(key, mut variant)| {
                    let asset = variant_assets.get(&key).unwrap_or(primary);
                    variant.url = asset.secure_url.clone();
                    variant.provider_metadata = Some(ProviderMetadata::from(asset).to_value());
                    (key, variant)
                })
                .collect()
        });

        Ok(LocationUpdate {
            url: primary.secure_url.clone(),
            provider: Provider::Cloudinary,
            provider_metadata: ProviderMetadata::from(primary),
            formats,
        })
    }
}
