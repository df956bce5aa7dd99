//! Object storage for product images.

use async_trait::async_trait;
use bytes::Bytes;

pub mod cloudinary;
pub mod memory;

pub use cloudinary::{CloudinaryConfig, CloudinaryImageStore};
pub use memory::MemoryImageStore;

/// An image received from the client, not yet stored.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Lower-cased extension of the file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    Upload(String),

    #[error("{0}")]
    Delete(String),

    #[error("Image storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected image storage response: {0}")]
    InvalidResponse(String),

    #[error("Image storage is not configured: {0}")]
    Config(String),
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the image and returns its durable public URL.
    async fn upload(&self, image: ImageUpload) -> Result<String, StorageError>;

    /// Removes the object with the given storage key. Deleting a key that
    /// is already gone succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
