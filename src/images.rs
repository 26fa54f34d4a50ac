//! Image hosting for uploads attached to form submissions.
//!
//! [`ImageHost`] is built once at startup by [`create_image_host`] and
//! shared through the server state. The Cloudinary client uses the signed
//! upload API: every request carries `api_key`, `timestamp` and a SHA-1
//! `signature` over the sorted parameters followed by the API secret.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::info;

use crate::config::{ImagesConfig, Secrets};
use crate::remote;

const CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com";

/// MIME types accepted for upload.
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// A hosted image.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
    pub width: u64,
    pub height: u64,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store `bytes` and return where they can be fetched.
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, content_type: &str)
        -> Result<UploadedImage>;

    /// Remove a previously uploaded image.
    async fn delete(&self, public_id: &str) -> Result<()>;
}

/// Check type and size before anything is sent to the host.
pub fn validate_image(content_type: &str, size: usize, max_bytes: usize) -> Result<()> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        bail!("Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed.");
    }
    if size > max_bytes {
        bail!("File size exceeds {} limit.", describe_size(max_bytes));
    }
    Ok(())
}

fn describe_size(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

pub fn create_image_host(config: &ImagesConfig, secrets: &Secrets) -> Result<Arc<dyn ImageHost>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledImageHost)),
        "cloudinary" => Ok(Arc::new(CloudinaryHost::new(config, secrets)?)),
        other => bail!("Unknown images provider: {}", other),
    }
}

pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
    async fn upload(&self, _: Vec<u8>, _: &str, _: &str) -> Result<UploadedImage> {
        bail!("Image uploads are not configured")
    }
    async fn delete(&self, _: &str) -> Result<()> {
        bail!("Image uploads are not configured")
    }
}

/// Cloudinary signed-upload client.
pub struct CloudinaryHost {
    client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

impl CloudinaryHost {
    pub fn new(config: &ImagesConfig, secrets: &Secrets) -> Result<Self> {
        let creds = secrets.cloudinary.clone().ok_or_else(|| {
            anyhow!("CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET must be set")
        })?;
        Ok(Self {
            client: remote::client(config.timeout_secs)?,
            base_url: remote::base_url(config.url.as_deref(), CLOUDINARY_BASE_URL),
            cloud_name: creds.cloud_name,
            api_key: creds.api_key,
            api_secret: creds.api_secret,
            folder: config.folder.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1_1/{}/image/{}", self.base_url, self.cloud_name, action)
    }
}

/// Cloudinary request signature: `sha1("k1=v1&k2=v2..." + secret)`, keys
/// sorted, empty values skipped.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_upload_response(json: &Value) -> Result<UploadedImage> {
    let url = json
        .get("secure_url")
        .and_then(|u| u.as_str())
        .ok_or_else(|| anyhow!("Upload failed: no result"))?;
    let public_id = json
        .get("public_id")
        .and_then(|p| p.as_str())
        .ok_or_else(|| anyhow!("Upload failed: missing public_id"))?;
    Ok(UploadedImage {
        url: url.to_string(),
        public_id: public_id.to_string(),
        width: json.get("width").and_then(|w| w.as_u64()).unwrap_or(0),
        height: json.get("height").and_then(|h| h.as_u64()).unwrap_or(0),
    })
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<UploadedImage> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", self.folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );
        let url = self.endpoint("upload");

        let mut part_headers = HeaderMap::new();
        part_headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);

        let json = remote::send_json("Cloudinary", 0, || {
            let part = reqwest::multipart::Part::bytes(bytes.clone())
                .file_name(file_name.to_string())
                .headers(part_headers.clone());
            let form = reqwest::multipart::Form::new()
                .text("api_key", self.api_key.clone())
                .text("timestamp", timestamp.clone())
                .text("folder", self.folder.clone())
                .text("signature", signature.clone())
                .part("file", part);
            self.client.post(&url).multipart(form)
        })
        .await?;

        let image = parse_upload_response(&json)?;
        info!(public_id = %image.public_id, "uploaded image");
        Ok(image)
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );
        let url = self.endpoint("destroy");
        let params = [
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
        ];

        let json = remote::send_json("Cloudinary", 0, || self.client.post(&url).form(&params))
            .await?;

        match json.get("result").and_then(|r| r.as_str()) {
            Some("ok") => {
                info!(public_id, "deleted image");
                Ok(())
            }
            Some(other) => bail!("Cloudinary could not delete {}: {}", public_id, other),
            None => bail!("Cloudinary destroy response missing result"),
        }
    }
}
