use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ImageStore, ImageUpload, StorageError};

/// Keeps uploaded images in process memory. URLs follow the Cloudinary
/// delivery layout so the key extractor works unchanged.
#[derive(Debug)]
pub struct MemoryImageStore {
    base_url: String,
    folder: Option<String>,
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryImageStore {
    pub fn new(base_url: impl Into<String>, folder: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            folder: folder.filter(|f| !f.trim().is_empty()),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, image: ImageUpload) -> Result<String, StorageError> {
        if image.bytes.is_empty() {
            return Err(StorageError::Upload(format!(
                "Empty file: {}",
                image.file_name
            )));
        }

        let id = Uuid::new_v4().simple().to_string();
        let key = match &self.folder {
            Some(folder) => format!("{folder}/{id}"),
            None => id,
        };
        let ext = image.extension().unwrap_or_else(|| "bin".to_string());
        let url = format!(
            "{}/image/upload/v{}/{}.{}",
            self.base_url,
            Utc::now().timestamp(),
            key,
            ext
        );

        self.objects.write().await.insert(key, image.bytes);
        Ok(url)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::images::storage_key_from_url;

    #[tokio::test]
    async fn uploaded_url_maps_back_to_its_key() {
        let store = MemoryImageStore::new("http://localhost/media/", Some("products".into()));
        let url = store
            .upload(ImageUpload::new(
                "pad.png",
                Some("image/png".into()),
                Bytes::from_static(b"png"),
            ))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost/media/image/upload/v"));
        assert!(url.ends_with(".png"));

        let key = storage_key_from_url(&url).expect("key");
        assert!(key.starts_with("products/"));
        assert!(store.contains(&key).await);

        store.delete(&key).await.unwrap();
        assert!(store.is_empty().await);
        // already gone
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn empty_files_are_rejected() {
        let store = MemoryImageStore::new("http://localhost", None);
        let err = store
            .upload(ImageUpload::new("x.jpg", None, Bytes::new()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Empty file: x.jpg");
    }
}
