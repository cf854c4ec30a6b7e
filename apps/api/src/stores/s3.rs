use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::stores::{sanitize_file_name, BlobStore, StoredBlob, UploadFile};

/// Blob store backed by an S3 bucket (MinIO locally, AWS in production).
#[derive(Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Constructs the client from config: static credentials, custom endpoint.
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "resumind-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        Self::new(aws_sdk_s3::Client::new(&s3_config), config.s3_bucket.clone())
    }
}

/// Object key for an upload; each upload gets its own prefix so repeated
/// submissions of the same file never collide.
fn object_key(file_name: &str) -> String {
    format!("resumes/{}/{}", Uuid::new_v4(), sanitize_file_name(file_name))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, file: &UploadFile) -> Result<Option<StoredBlob>> {
        let key = object_key(&file.name);
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.bytes.clone()))
            .content_type(&file.content_type)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!("Uploaded {} bytes to s3://{}/{}", file.bytes.len(), self.bucket, key);
                Ok(Some(StoredBlob { path: key }))
            }
            Err(e) => {
                warn!("S3 upload of '{}' failed: {e}", file.name);
                Ok(None)
            }
        }
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                    return Ok(None);
                }
                return Err(anyhow::anyhow!("S3 read of {path} failed: {e}"));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to stream s3://{}/{path}", self.bucket))?;
        Ok(Some(data.into_bytes()))
    }
}
