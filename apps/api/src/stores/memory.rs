//! In-memory stores for `STORAGE_BACKEND=memory` and for tests.
//! Contents are lost when the process exits.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::stores::{
    glob_matches, sanitize_file_name, BlobStore, KvEntry, KvStore, StoredBlob, UploadFile,
};

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, file: &UploadFile) -> Result<Option<StoredBlob>> {
        let path = format!("memory/{}/{}", Uuid::new_v4(), sanitize_file_name(&file.name));
        self.blobs
            .write()
            .await
            .insert(path.clone(), file.bytes.clone());
        Ok(Some(StoredBlob { path }))
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        Ok(self.blobs.read().await.get(path).cloned())
    }
}

struct KvValue {
    value: String,
    expires_at: Option<Instant>,
}

impl KvValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Expired keys are hidden from reads and dropped on the next write.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, KvValue>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, key: &str, value: String, expires_at: Option<Instant>) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, v| v.is_live(now));
        entries.insert(key.to_string(), KvValue { value, expires_at });
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.value.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.insert(key, value, None).await;
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.insert(key, value, Some(Instant::now() + ttl)).await;
        Ok(())
    }

    async fn list(&self, pattern: &str, with_values: bool) -> Result<Vec<KvEntry>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut listed: Vec<KvEntry> = entries
            .iter()
            .filter(|(key, v)| v.is_live(now) && glob_matches(pattern, key))
            .map(|(key, v)| KvEntry {
                key: key.clone(),
                value: with_values.then(|| v.value.clone()),
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
