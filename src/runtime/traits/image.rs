// ABOUTME: Image operations trait for the container engine.
// ABOUTME: List, tag, remove, and prune images of one repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::types::ImageRef;

/// Image operations.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// List local images whose repository matches `pattern` (`mushak-shop`, `mushak-shop-*`).
    async fn list_images(&self, pattern: &str) -> Result<Vec<ImageSummary>, ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Add `target` as another tag of `source`.
    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError>;

    /// Remove an image tag.
    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError>;

    /// Remove dangling layers older than `older_than`.
    async fn prune_dangling(&self, older_than: Duration) -> Result<(), ImageError>;
}

/// One local image and all its `repo:tag` references.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    pub id: String,
    pub tags: Vec<ImageRef>,
    pub created: DateTime<Utc>,
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
