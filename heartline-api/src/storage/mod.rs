//! Where photo bytes live. Profiles only hold the opaque references these
//! backends hand out.

use async_trait::async_trait;
use uuid::Uuid;

pub mod disk;
pub mod minio;

pub use disk::DiskStorage;
pub use minio::MinioStorage;

#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Store one image and return the reference to put on the profile.
    async fn put(&self, owner: Uuid, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String>;
    async fn remove(&self, reference: &str) -> anyhow::Result<()>;
}

/// File extension for the accepted image types.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
