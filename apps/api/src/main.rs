mod analysis;
mod auth;
mod config;
mod errors;
mod llm_client;
mod models;
mod preview;
mod records;
mod routes;
mod session;
mod state;
mod stores;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::ai::FeedbackService;
use crate::analysis::progress::SubmissionTracker;
use crate::auth::KvSessionAuth;
use crate::config::{Config, StorageBackend};
use crate::llm_client::{AnthropicFeedbackService, LlmClient};
use crate::preview::{PdfiumConverter, PreviewConverter};
use crate::routes::build_router;
use crate::state::AppState;
use crate::stores::deadline::Deadline;
use crate::stores::memory::{MemoryBlobStore, MemoryKvStore};
use crate::stores::redis_kv::RedisKvStore;
use crate::stores::s3::S3BlobStore;
use crate::stores::{BlobStore, KvStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resumind API v{}", env!("CARGO_PKG_VERSION"));

    let (mut blobs, mut kv): (Arc<dyn BlobStore>, Arc<dyn KvStore>) = match config.storage_backend
    {
        StorageBackend::Remote => {
            let kv = RedisKvStore::connect(&config.redis_url).await?;
            let blobs = S3BlobStore::from_config(&config).await;
            info!("S3 client initialized (bucket: {})", config.s3_bucket);
            (Arc::new(blobs), Arc::new(kv))
        }
        StorageBackend::Memory => {
            info!("Using in-memory stores; data will not survive a restart");
            (Arc::new(MemoryBlobStore::new()), Arc::new(MemoryKvStore::new()))
        }
    };

    let mut converter: Arc<dyn PreviewConverter> =
        Arc::new(PdfiumConverter::new(config.pdfium_lib_dir.clone()));

    if let Some(limit) = config.collaborator_timeout {
        info!("Collaborator calls time out after {}s", limit.as_secs());
        blobs = Arc::new(Deadline::new(blobs, limit));
        kv = Arc::new(Deadline::new(kv, limit));
        converter = Arc::new(Deadline::new(converter, limit));
    }

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let mut ai: Arc<dyn FeedbackService> =
        Arc::new(AnthropicFeedbackService::new(llm, Arc::clone(&blobs)));
    if let Some(limit) = config.collaborator_timeout {
        ai = Arc::new(Deadline::new(ai, limit));
    }

    let auth = Arc::new(KvSessionAuth::new(
        Arc::clone(&kv),
        config.access_password.clone(),
    ));

    // Build app state
    let state = AppState {
        blobs,
        kv,
        converter,
        ai,
        auth,
        submissions: Arc::new(SubmissionTracker::new()),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
