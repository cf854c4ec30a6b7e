//! Optional per-call deadline for collaborators.
//!
//! No timeout is imposed unless `COLLABORATOR_TIMEOUT_SECS` is set; then every
//! collaborator in `AppState` is wrapped in a `Deadline`, and an elapsed call
//! surfaces as an ordinary `Err`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;

use crate::analysis::ai::{AiResponse, FeedbackService};
use crate::preview::PreviewConverter;
use crate::stores::{BlobStore, KvEntry, KvStore, StoredBlob, UploadFile};

pub struct Deadline<T: ?Sized> {
    inner: Arc<T>,
    limit: Duration,
}

impl<T: ?Sized> Deadline<T> {
    pub fn new(inner: Arc<T>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn within<R>(&self, call: &str, fut: impl Future<Output = Result<R>>) -> Result<R> {
        tokio::time::timeout(self.limit, fut)
            .await
            .map_err(|_| anyhow!("{call} timed out after {}s", self.limit.as_secs_f32()))?
    }
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Deadline<T> {
    async fn upload(&self, file: &UploadFile) -> Result<Option<StoredBlob>> {
        self.within("blob upload", self.inner.upload(file)).await
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        self.within("blob read", self.inner.read(path)).await
    }
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Deadline<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.within("kv get", self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.within("kv set", self.inner.set(key, value)).await
    }

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.within("kv set", self.inner.set_with_expiry(key, value, ttl))
            .await
    }

    async fn list(&self, pattern: &str, with_values: bool) -> Result<Vec<KvEntry>> {
        self.within("kv list", self.inner.list(pattern, with_values))
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.within("kv delete", self.inner.delete(key)).await
    }
}

#[async_trait]
impl<T: PreviewConverter + ?Sized> PreviewConverter for Deadline<T> {
    async fn convert(&self, document: &UploadFile) -> Result<Option<UploadFile>> {
        self.within("preview conversion", self.inner.convert(document))
            .await
    }
}

#[async_trait]
impl<T: FeedbackService + ?Sized> FeedbackService for Deadline<T> {
    async fn feedback(&self, document_path: &str, instructions: &str) -> Result<Option<AiResponse>> {
        self.within(
            "AI feedback",
            self.inner.feedback(document_path, instructions),
        )
        .await
    }
}
