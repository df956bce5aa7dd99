use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{ImageStore, ImageUpload, StorageError};
use crate::config::AppConfig;

#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl CloudinaryConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Result<Self, StorageError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| StorageError::Config(format!("{name} is missing")))
        };

        Ok(Self {
            cloud_name: required(&cfg.cloudinary_cloud_name, "cloudinary_cloud_name")?,
            api_key: required(&cfg.cloudinary_api_key, "cloudinary_api_key")?,
            api_secret: required(&cfg.cloudinary_api_secret, "cloudinary_api_secret")?,
            folder: cfg
                .cloudinary_folder
                .clone()
                .filter(|f| !f.trim().is_empty()),
            base_url: cfg.cloudinary_base_url.trim_end_matches('/').to_string(),
            timeout: cfg.storage_timeout(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorMessage {
    message: String,
}

/// Signs request parameters the way the Cloudinary upload API expects:
/// `sha256(sorted "k=v" pairs joined by '&' + secret)`, hex encoded.
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cloudinary image store using signed REST calls.
#[derive(Clone)]
pub struct CloudinaryImageStore {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryImageStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{}",
            self.config.base_url, self.config.cloud_name, action
        )
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or_else(|_| format!("Image storage returned {status}: {text}"))
    }
}

#[async_trait]
impl ImageStore for CloudinaryImageStore {
    #[instrument(skip(self, image), fields(file = %image.file_name, size = image.bytes.len()))]
    async fn upload(&self, image: ImageUpload) -> Result<String, StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let mut params = vec![("timestamp", timestamp.clone())];
        if let Some(folder) = &self.config.folder {
            params.push(("folder", folder.clone()));
        }
        let signature = sign(&params, &self.config.api_secret);

        let mut file = Part::bytes(image.bytes.to_vec()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            file = file
                .mime_str(content_type)
                .map_err(|e| StorageError::Upload(format!("Invalid content type: {e}")))?;
        }

        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);
        if let Some(folder) = &self.config.folder {
            form = form.text("folder", folder.clone());
        }

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            warn!("Image upload rejected: {}", message);
            return Err(StorageError::Upload(message));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        debug!(url = %body.secure_url, "image uploaded");
        Ok(body.secure_url)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let params = vec![("public_id", key.to_string()), ("timestamp", timestamp.clone())];
        let signature = sign(&params, &self.config.api_secret);

        let form = [
            ("public_id", key.to_string()),
            ("api_key", self.config.api_key.clone()),
            ("timestamp", timestamp),
            ("signature", signature),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            return Err(StorageError::Delete(message));
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(StorageError::Delete(format!(
                "Image storage refused to delete {key}: {other}"
            ))),
        }
    }
}
