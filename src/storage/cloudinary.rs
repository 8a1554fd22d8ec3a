use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::Deserialize;

use crate::config::CloudinaryConfig;
use crate::error::{AppError, AppResult};

use super::{MediaHost, ResourceType, UploadOptions, UploadedAsset};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Cloudinary signed upload API client
pub struct CloudinaryBackend {
    config: CloudinaryConfig,
    http_client: reqwest::Client,
    api_base: String,
}

impl CloudinaryBackend {
    pub fn new(config: CloudinaryConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            config,
            http_client,
            api_base: API_BASE.to_string(),
        })
    }

    fn upload_url(&self, resource_type: ResourceType) -> String {
        format!(
            "{}/{}/{}/upload",
            self.api_base, self.config.cloud_name, resource_type
        )
    }

    /// Parameters that take part in the request signature
    fn signed_params(options: &UploadOptions, timestamp: u64) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("timestamp", timestamp.to_string());
        if !options.folder.is_empty() {
            params.insert("folder", options.folder.clone());
        }
        if let Some(public_id) = &options.public_id {
            params.insert("public_id", public_id.clone());
        }
        if options.use_filename {
            params.insert("use_filename", "true".to_string());
        }
        if !options.unique_filename {
            params.insert("unique_filename", "false".to_string());
        }
        params
    }

    /// SHA-1 hex digest of `k1=v1&k2=v2...` (keys sorted) followed by the API secret
    pub fn generate_signature(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
        let to_sign = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let digest = ring::digest::digest(
            &ring::digest::SHA1_FOR_LEGACY_USE_ONLY,
            format!("{}{}", to_sign, api_secret).as_bytes(),
        );
        hex::encode(digest.as_ref())
    }

    fn generate_timestamp() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MediaHost for CloudinaryBackend {
    async fn upload(&self, path: &Path, options: &UploadOptions) -> AppResult<UploadedAsset> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let params = Self::signed_params(options, Self::generate_timestamp());
        let signature = Self::generate_signature(&params, &self.config.api_secret);

        let mut form = Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }
        form = form.part(
            "file",
            Part::stream_with_length(Body::from(file), length).file_name(file_name),
        );

        let response = self
            .http_client
            .post(self.upload_url(options.resource_type))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            tracing::error!(
                "Cloudinary upload failed: path={}, status={}, message={}",
                path.display(),
                status,
                message
            );
            return Err(AppError::Upload(format!("{} - {}", status, message)));
        }

        let asset: UploadedAsset = response.json().await?;
        tracing::debug!(
            "Cloudinary upload: path={}, public_id={}, resource_type={}",
            path.display(),
            asset.public_id,
            asset.resource_type
        );
        Ok(asset)
    }

    fn delivery_url(&self, public_id: &str, resource_type: ResourceType) -> String {
        format!(
            "{}/{}/{}/upload/{}",
            DELIVERY_BASE, self.config.cloud_name, resource_type, public_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> CloudinaryBackend {
        CloudinaryBackend::new(CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "1234".to_string(),
            api_secret: "secret".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_signature_matches_documented_example() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample_image".to_string());
        params.insert("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string());
        assert_eq!(
            CloudinaryBackend::generate_signature(&params, "abcd"),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn test_signed_params_for_hash_upload() {
        let options = UploadOptions::with_public_id("strapi-uploads", "abc123");
        let params = CloudinaryBackend::signed_params(&options, 1_700_000_000);
        let keys: Vec<_> = params.keys().copied().collect();
        assert_eq!(keys, vec!["folder", "public_id", "timestamp"]);
        assert_eq!(
            CloudinaryBackend::generate_signature(&params, "secret"),
            "7fb6304d4064a237091775f4118083bdf0c3b105"
        );
    }

    #[test]
    fn test_signed_params_for_filename_upload() {
        let options = UploadOptions::with_filename("strapi-uploads");
        let params = CloudinaryBackend::signed_params(&options, 1);
        assert_eq!(params.get("use_filename").map(String::as_str), Some("true"));
        assert_eq!(params.get("unique_filename").map(String::as_str), Some("false"));
        assert!(!params.contains_key("public_id"));
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Accepts one upload request and answers with a fixed asset
    async fn serve_once(listener: tokio::net::TcpListener) -> Vec<u8> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 16 * 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let Some(end) = find(&request, b"END-OF-ASSET") else {
                continue;
            };
            let chunked = String::from_utf8_lossy(&request)
                .to_ascii_lowercase()
                .contains("transfer-encoding: chunked");
            let tail = &request[end..];
            let done = if chunked {
                tail.ends_with(b"0\r\n\r\n")
            } else {
                find(tail, b"--\r\n").is_some()
            };
            if done {
                break;
            }
        }

        let body = r#"{"secure_url":"https://res.cloudinary.com/demo/video/upload/strapi-uploads/clip.mp4","public_id":"strapi-uploads/clip","resource_type":"video"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        request
    }

    #[tokio::test]
    async fn test_upload_streams_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let mut data = vec![b'x'; 256 * 1024];
        data.extend_from_slice(b"END-OF-ASSET");
        std::fs::write(&path, &data).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener));

        let backend = CloudinaryBackend {
            http_client: reqwest::Client::builder().no_proxy().build().unwrap(),
            api_base: format!("http://{}/v1_1", addr),
            ..backend()
        };
        let options = UploadOptions::with_public_id("strapi-uploads", "clip");
        let asset = backend.upload(&path, &options).await.unwrap();
        assert_eq!(asset.public_id, "strapi-uploads/clip");
        assert_eq!(asset.resource_type, "video");

        let request = server.await.unwrap();
        let text = String::from_utf8_lossy(&request);
        assert!(text.starts_with("POST /v1_1/demo/auto/upload"));
        assert!(text.contains("filename=\"clip.mp4\""));
        assert!(text.contains("name=\"public_id\""));
        let end = find(&request, b"END-OF-ASSET").unwrap() + b"END-OF-ASSET".len();
        assert_eq!(&request[end - data.len()..end], &data[..]);
    }

    #[test]
    fn test_urls() {
        let backend = backend();
        assert_eq!(
            backend.upload_url(ResourceType::Auto),
            "https://api.cloudinary.com/v1_1/demo/auto/upload"
        );
        assert_eq!(
            backend.delivery_url("strapi-uploads/abc.png", ResourceType::Image),
            "https://res.cloudinary.com/demo/image/upload/strapi-uploads/abc.png"
        );
    }
}
