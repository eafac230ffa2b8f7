use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use heartline_shared::clients::MinioClient;

use crate::storage::{extension_for, PhotoStorage};

pub struct MinioStorage {
    client: MinioClient,
}

impl MinioStorage {
    pub fn new(client: MinioClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PhotoStorage for MinioStorage {
    async fn put(&self, owner: Uuid, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let ext = extension_for(content_type)
            .with_context(|| format!("unsupported content type {content_type}"))?;
        let key = format!("profiles/{owner}/{}.{ext}", Uuid::now_v7());
        self.client.upload(&key, bytes, content_type).await
    }

    async fn remove(&self, reference: &str) -> anyhow::Result<()> {
        let key = self
            .client
            .key_for(reference)
            .with_context(|| format!("reference is not in this bucket: {reference}"))?;
        self.client.delete(&key).await
    }
}
