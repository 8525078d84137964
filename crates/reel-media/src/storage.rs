//! Object storage uploads through the media service.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::config::MediaServiceConfig;
use crate::error::{MediaError, MediaResult};

/// Form field the upload route reads, for every file type.
const UPLOAD_FIELD: &str = "audio";

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedObject {
    /// Public URL
    pub url: String,
    /// Name the service stored it under
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// Uploads binary payloads and returns their public URLs.
#[derive(Debug, Clone)]
pub struct ObjectStorageClient {
    http: Client,
    base_url: String,
}

impl ObjectStorageClient {
    pub fn new(config: MediaServiceConfig) -> MediaResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> MediaResult<Self> {
        Self::new(MediaServiceConfig::from_env())
    }

    /// Upload raw bytes.
    pub async fn upload(&self, bytes: Vec<u8>, filename: &str, mime_type: &str) -> MediaResult<UploadedObject> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| MediaError::upload_rejected(format!("invalid mime type {mime_type}: {e}")))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .http
            .post(format!("{}/api/upload-audio", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::upload_rejected(format!("{}: {}", status.as_u16(), text)));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::invalid_response(e.to_string()))?;

        match (body.success, body.url) {
            (true, Some(url)) if !url.is_empty() => {
                info!(filename = %filename, bytes = size, url = %url, "Object uploaded");
                Ok(UploadedObject {
                    url,
                    filename: body.filename,
                })
            }
            _ => Err(MediaError::invalid_response("upload response without success and url")),
        }
    }

    /// Upload a base64 PNG, with or without a `data:image/...;base64,` prefix.
    pub async fn upload_image_base64(&self, image: &str, filename: &str) -> MediaResult<UploadedObject> {
        let bytes = decode_image(image)?;
        self.upload(bytes, filename, "image/png").await
    }
}

fn decode_image(image: &str) -> MediaResult<Vec<u8>> {
    let data = match image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:image/") => data,
        _ => image,
    };
    STANDARD
        .decode(data.trim())
        .map_err(|e| MediaError::InvalidImage(e.to_string()))
}
