use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Uploads above this size are refused (20 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Redis for records and sessions, S3 for documents.
    Remote,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub access_password: String,
    pub pdfium_lib_dir: Option<String>,
    pub max_upload_bytes: usize,
    pub collaborator_timeout: Option<Duration>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend = match optional_env("STORAGE_BACKEND").as_deref() {
            None | Some("remote") => StorageBackend::Remote,
            Some("memory") => StorageBackend::Memory,
            Some(other) => bail!("STORAGE_BACKEND must be 'remote' or 'memory', got '{other}'"),
        };

        // Remote stores are only required when they will be used.
        let remote = |key: &str| -> Result<String> {
            match storage_backend {
                StorageBackend::Remote => require_env(key),
                StorageBackend::Memory => Ok(optional_env(key).unwrap_or_default()),
            }
        };

        Ok(Config {
            storage_backend,
            redis_url: remote("REDIS_URL")?,
            s3_bucket: remote("S3_BUCKET")?,
            s3_endpoint: remote("S3_ENDPOINT")?,
            aws_access_key_id: remote("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: remote("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            access_password: require_env("ACCESS_PASSWORD")?,
            pdfium_lib_dir: optional_env("PDFIUM_LIB_DIR"),
            max_upload_bytes: match optional_env("MAX_UPLOAD_BYTES") {
                Some(v) => v
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
            collaborator_timeout: optional_env("COLLABORATOR_TIMEOUT_SECS")
                .map(|v| {
                    v.parse::<u64>()
                        .map(Duration::from_secs)
                        .context("COLLABORATOR_TIMEOUT_SECS must be a whole number of seconds")
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
