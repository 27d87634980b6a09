use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ZaiError;

/// Remote image store. Each call returns an opaque id the backend can attach
/// to the chat as a file.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload raw base64 image data (without the `data:` prefix)
    async fn upload_base64(&self, access_token: &str, payload: &str) -> Result<String, ZaiError>;

    /// Let the store fetch an image from a remote URL
    async fn upload_from_url(&self, access_token: &str, url: &str) -> Result<String, ZaiError>;
}

/// Uploader for deployments without an image store; any image fails the request
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageUploader;

#[async_trait]
impl ImageUploader for NoImageUploader {
    async fn upload_base64(&self, _access_token: &str, _payload: &str) -> Result<String, ZaiError> {
        Err(ZaiError::ImageUpload("no image uploader configured".to_string()))
    }

    async fn upload_from_url(&self, _access_token: &str, url: &str) -> Result<String, ZaiError> {
        Err(ZaiError::ImageUpload(format!(
            "no image uploader configured for {url}"
        )))
    }
}

/// Where an image URL should be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Payload of a `data:image/...;base64,` URI
    Base64(&'a str),
    /// Remote http(s) URL, passed through unchanged
    Url(&'a str),
}

/// Classify an image URL. Anything that is neither a data URI nor http(s) is skipped.
#[must_use]
pub fn classify_image_url(url: &str) -> Option<ImageSource<'_>> {
    if url.starts_with("data:image/") {
        let payload = url.rsplit_once("base64,").map_or(url, |(_, payload)| payload);
        Some(ImageSource::Base64(payload))
    } else if url.starts_with("http") {
        Some(ImageSource::Url(url))
    } else {
        None
    }
}

/// File attachment in the upstream request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub r#type: String,
    pub id: String,
}

impl FileRef {
    pub fn image(id: impl Into<String>) -> Self {
        Self {
            r#type: "image".to_string(),
            id: id.into(),
        }
    }
}

/// Upload every image in encounter order. The first failure aborts the batch.
pub async fn upload_images(
    uploader: &dyn ImageUploader,
    access_token: &str,
    urls: &[String],
) -> Result<Vec<FileRef>, ZaiError> {
    let mut files = Vec::with_capacity(urls.len());

    for url in urls {
        let id = match classify_image_url(url) {
            Some(ImageSource::Base64(payload)) => {
                uploader.upload_base64(access_token, payload).await?
            }
            Some(ImageSource::Url(url)) => uploader.upload_from_url(access_token, url).await?,
            None => {
                log::debug!("Skipping image with unsupported URL scheme");
                continue;
            }
        };
        files.push(FileRef::image(id));
    }

    Ok(files)
}
