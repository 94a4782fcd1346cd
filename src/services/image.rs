use base64::{engine::general_purpose, Engine};
use std::time::Duration;

use super::vision::ImageReference;
use crate::error::ApiError;

/// Larger images are rejected before they reach a model.
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Turns the caller's `imageUrl` into something a vision model can consume.
pub struct ImageFetcher {
    client: reqwest::Client,
    inline: bool,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client, inline: bool, timeout: Duration) -> Self {
        Self { client, inline, timeout }
    }

    pub async fn resolve(&self, image_url: &str) -> Result<ImageReference, ApiError> {
        let image_url = image_url.trim();

        if image_url.starts_with("data:") {
            log::debug!("🖼️ Using inline data URL ({} chars)", image_url.len());
            return Ok(ImageReference::Url(image_url.to_string()));
        }

        if !(image_url.starts_with("http://") || image_url.starts_with("https://")) {
            return Err(ApiError::InvalidRequest(
                "imageUrl must be an http(s) or data URL".to_string(),
            ));
        }

        if !self.inline {
            return Ok(ImageReference::Url(image_url.to_string()));
        }

        log::debug!("📸 Fetching image: {}", image_url);

        let response = self
            .client
            .get(image_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::ImageFetch(e.to_string()))?;

        log::debug!("📥 Image response status: {}", response.status());

        if !response.status().is_success() {
            return Err(ApiError::ImageFetch(format!("HTTP {}", response.status())));
        }

        if response.content_length().is_some_and(|len| len > MAX_IMAGE_BYTES) {
            return Err(ApiError::ImageFetch(format!(
                "image larger than {} bytes",
                MAX_IMAGE_BYTES
            )));
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::ImageFetch(e.to_string()))?;

        if bytes.len() as u64 > MAX_IMAGE_BYTES {
            return Err(ApiError::ImageFetch(format!(
                "image larger than {} bytes",
                MAX_IMAGE_BYTES
            )));
        }

        let mime_type = mime_type_for(header_mime.as_deref(), image_url);
        let base64_data = general_purpose::STANDARD.encode(&bytes);

        log::debug!("📊 Image size: {} bytes, base64: {} bytes, type: {}", bytes.len(), base64_data.len(), mime_type);

        Ok(ImageReference::Inline { mime_type, base64_data })
    }
}

/// Prefers an `image/*` Content-Type, falls back to the URL's extension.
fn mime_type_for(content_type: Option<&str>, url: &str) -> String {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or("").trim().to_lowercase();
        if essence.starts_with("image/") {
            return essence;
        }
    }

    // Signed URLs carry a query string after the file name
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();

    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
    .to_string()
}
