use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use uuid::Uuid;

use crate::storage::{extension_for, PhotoStorage};

pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Photos as files in one directory, served back under `/uploads/`.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference back to a file inside the root, refusing anything
    /// that could escape it.
    fn path_for(&self, reference: &str) -> anyhow::Result<PathBuf> {
        let name = reference
            .strip_prefix(PUBLIC_PREFIX)
            .with_context(|| format!("not a local photo reference: {reference}"))?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("invalid photo reference: {reference}");
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl PhotoStorage for DiskStorage {
    async fn put(&self, owner: Uuid, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let ext = extension_for(content_type)
            .with_context(|| format!("unsupported content type {content_type}"))?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating {}", self.root.display()))?;

        let name = format!("{owner}-{}.{ext}", Uuid::now_v7().simple());
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        Ok(format!("{PUBLIC_PREFIX}{name}"))
    }

    async fn remove(&self, reference: &str) -> anyhow::Result<()> {
        let path = self.path_for(reference)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("removing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());

        let reference = storage.put(Uuid::now_v7(), b"jpeg bytes".to_vec(), "image/jpeg").await.unwrap();
        assert!(reference.starts_with("/uploads/"));
        assert!(reference.ends_with(".jpg"));

        let path = storage.path_for(&reference).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"jpeg bytes");

        storage.remove(&reference).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn rejects_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        assert!(storage.put(Uuid::now_v7(), vec![0], "text/plain").await.is_err());
    }

    #[test]
    fn references_cannot_escape_root() {
        let storage = DiskStorage::new("/srv/uploads");
        assert!(storage.path_for("/uploads/../etc/passwd").is_err());
        assert!(storage.path_for("/uploads/..").is_err());
        assert!(storage.path_for("/uploads/a/b.jpg").is_err());
        assert!(storage.path_for("https://cdn.example.com/x.jpg").is_err());
        assert_eq!(
            storage.path_for("/uploads/x.jpg").unwrap(),
            PathBuf::from("/srv/uploads/x.jpg")
        );
    }

    #[tokio::test]
    async fn removing_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        assert!(storage.remove("/uploads/gone.jpg").await.is_err());
    }
}
