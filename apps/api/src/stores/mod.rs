//! Storage collaborators: the blob store holding uploaded documents and
//! previews, and the key-value store holding resume records and sessions.
//!
//! Both are traits so the service can run against S3 + Redis in production
//! and in-memory maps in development and tests. `AppState` carries them as
//! `Arc<dyn BlobStore>` / `Arc<dyn KvStore>`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod deadline;
pub mod memory;
pub mod redis_kv;
pub mod s3;

/// A named file handed to the blob store or produced by the converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Where the blob store put an upload. The path is opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    /// Present only when the listing asked for values.
    pub value: Option<String>,
}

/// Blob storage. `Ok(None)` means the store declined or failed the request in
/// an expected way; `Err` is reserved for unexpected failures.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, file: &UploadFile) -> Result<Option<StoredBlob>>;

    async fn read(&self, path: &str) -> Result<Option<Bytes>>;
}

/// Key-value storage with per-key atomicity and glob listing.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Like `set`, but the key disappears once `ttl` has elapsed.
    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Lists entries whose key matches `pattern` (`*` matches any run of
    /// characters). Values are fetched only when `with_values` is set.
    async fn list(&self, pattern: &str, with_values: bool) -> Result<Vec<KvEntry>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Glob match supporting `*` only, the subset the service relies on.
pub fn glob_matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // no `*` in the pattern: exact match
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Keeps blob paths readable and free of separators a client could abuse.
pub(crate) fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
