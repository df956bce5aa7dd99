//! Product image bookkeeping: which stored images to drop, how to address
//! them in object storage, and best-effort cleanup.

use futures::future::join_all;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::storage::{ImageStore, ImageUpload, StorageError};

const UPLOAD_MARKER: &str = "/upload/";

static VERSION_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v\d+/").unwrap());

/// Images present in `existing` but absent from `keep`, each listed once.
pub fn images_to_delete(existing: &[String], keep: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .filter(|url| !keep.contains(*url))
        .filter(|url| seen.insert(url.as_str()))
        .cloned()
        .collect()
}

/// Extracts the storage key from a delivery URL such as
/// `https://res.cloudinary.com/demo/image/upload/v1690000000/products/abc.jpg`
/// (key `products/abc`). Returns `None` when the URL carries no key.
pub fn storage_key_from_url(url: &str) -> Option<String> {
    let (_, after) = url.split_once(UPLOAD_MARKER)?;
    let path = VERSION_SEGMENT.replace(after, "");

    let key = match path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/{}", strip_extension(file)),
        None => strip_extension(&path).to_string(),
    };

    if key.is_empty() || key.ends_with('/') {
        None
    } else {
        Some(key)
    }
}

fn strip_extension(file: &str) -> &str {
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

/// Rejects retained URLs that the product does not currently own.
pub fn ensure_retained_subset(current: &[String], retained: &[String]) -> Result<(), ServiceError> {
    let owned: HashSet<&str> = current.iter().map(String::as_str).collect();
    match retained.iter().find(|url| !owned.contains(url.as_str())) {
        Some(foreign) => Err(ServiceError::validation(format!(
            "Image {foreign} does not belong to this product"
        ))),
        None => Ok(()),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeletionOutcome {
    Deleted { url: String, key: String },
    /// The URL did not map to a storage key; nothing was sent.
    Skipped { url: String },
    Failed { url: String, key: String, error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpload {
    pub file_name: String,
    pub error: String,
}

/// What happened to the remote side of an update or delete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deletions: Vec<DeletionOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_uploads: Vec<FailedUpload>,
}

impl CleanupReport {
    pub fn attempted(&self) -> usize {
        self.deletions
            .iter()
            .filter(|d| !matches!(d, DeletionOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.deletions
            .iter()
            .filter(|d| matches!(d, DeletionOutcome::Failed { .. }))
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.failed_uploads.is_empty()
    }
}

/// Deletes every URL's object concurrently. Never fails; the report carries
/// per-item outcomes in input order.
pub async fn purge_images(store: &dyn ImageStore, urls: &[String]) -> CleanupReport {
    let deletions = join_all(urls.iter().map(|url| async move {
        let Some(key) = storage_key_from_url(url) else {
            debug!(%url, "no storage key in image url, skipping delete");
            return DeletionOutcome::Skipped { url: url.clone() };
        };

        match store.delete(&key).await {
            Ok(()) => {
                counter!("storefront_images.deleted", 1);
                DeletionOutcome::Deleted {
                    url: url.clone(),
                    key,
                }
            }
            Err(err) => {
                counter!("storefront_images.delete_failed", 1);
                warn!(%url, %key, error = %err, "failed to delete stored image");
                DeletionOutcome::Failed {
                    url: url.clone(),
                    key,
                    error: err.to_string(),
                }
            }
        }
    }))
    .await;

    CleanupReport {
        deletions,
        failed_uploads: Vec::new(),
    }
}

/// Uploads all files concurrently; results line up with `files`.
pub async fn upload_in_order(
    store: &dyn ImageStore,
    files: Vec<ImageUpload>,
) -> Vec<(String, Result<String, StorageError>)> {
    join_all(files.into_iter().map(|file| async move {
        let name = file.file_name.clone();
        let result = store.upload(file).await;
        match &result {
            Ok(_) => counter!("storefront_images.uploaded", 1),
            Err(_) => counter!("storefront_images.upload_failed", 1),
        }
        (name, result)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_returns_dropped_images_once() {
        let existing = urls(&["a", "b", "c", "b"]);
        let keep: HashSet<String> = urls(&["a", "c"]).into_iter().collect();
        assert_eq!(images_to_delete(&existing, &keep), urls(&["b"]));
        assert!(images_to_delete(&existing, &existing.iter().cloned().collect()).is_empty());
    }

    #[test]
    fn key_strips_version_and_extension() {
        assert_eq!(
            storage_key_from_url(
                "https://res.cloudinary.com/demo/image/upload/v1690000000/products/abc.jpg"
            )
            .as_deref(),
            Some("products/abc")
        );
        assert_eq!(
            storage_key_from_url("https://res.cloudinary.com/demo/image/upload/abc.png").as_deref(),
            Some("abc")
        );
        assert_eq!(
            storage_key_from_url("https://cdn.example/image/upload/v12/my.folder/file.name.webp")
                .as_deref(),
            Some("my.folder/file.name")
        );
    }

    #[test]
    fn key_is_none_without_marker_or_path() {
        assert_eq!(storage_key_from_url("https://example.com/images/abc.jpg"), None);
        assert_eq!(storage_key_from_url("https://res.cloudinary.com/demo/image/upload/"), None);
    }

    #[test]
    fn retained_urls_must_belong_to_the_product() {
        let current = urls(&["a", "b"]);
        assert!(ensure_retained_subset(&current, &urls(&["b"])).is_ok());
        let err = ensure_retained_subset(&current, &urls(&["a", "z"])).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("z"));
    }

    #[test]
    fn report_counts() {
        let report = CleanupReport {
            deletions: vec![
                DeletionOutcome::Deleted {
                    url: "u1".into(),
                    key: "k1".into(),
                },
                DeletionOutcome::Skipped { url: "u2".into() },
                DeletionOutcome::Failed {
                    url: "u3".into(),
                    key: "k3".into(),
                    error: "boom".into(),
                },
            ],
            failed_uploads: vec![],
        };
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_clean());
    }
}
