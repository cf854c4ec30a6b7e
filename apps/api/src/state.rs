use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::warn;

use crate::analysis::ai::FeedbackService;
use crate::analysis::progress::SubmissionTracker;
use crate::auth::{bearer_token, AuthService};
use crate::config::Config;
use crate::preview::PreviewConverter;
use crate::session::Session;
use crate::stores::{BlobStore, KvStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub blobs: Arc<dyn BlobStore>,
    pub kv: Arc<dyn KvStore>,
    pub converter: Arc<dyn PreviewConverter>,
    pub ai: Arc<dyn FeedbackService>,
    pub auth: Arc<dyn AuthService>,
    /// In-flight and recently finished submissions, for progress polling.
    pub submissions: Arc<SubmissionTracker>,
    pub config: Config,
}

impl AppState {
    /// Builds the caller's session from the request's bearer token.
    /// An auth backend failure counts as signed out.
    pub async fn session(&self, headers: &HeaderMap) -> Session {
        let authenticated = match self.auth.is_authenticated(bearer_token(headers)).await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                warn!("Session lookup failed: {e:?}");
                false
            }
        };

        Session {
            authenticated,
            blobs: Arc::clone(&self.blobs),
            kv: Arc::clone(&self.kv),
            converter: Arc::clone(&self.converter),
            ai: Arc::clone(&self.ai),
        }
    }
}
