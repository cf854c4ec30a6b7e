use std::sync::Arc;

use crate::analysis::ai::FeedbackService;
use crate::preview::PreviewConverter;
use crate::stores::{BlobStore, KvStore};

/// Everything one caller's request may touch: whether the caller is signed
/// in, plus handles to each collaborator. Built per request from `AppState`
/// and passed explicitly to the pipeline and to record operations.
#[derive(Clone)]
pub struct Session {
    pub authenticated: bool,
    pub blobs: Arc<dyn BlobStore>,
    pub kv: Arc<dyn KvStore>,
    pub converter: Arc<dyn PreviewConverter>,
    pub ai: Arc<dyn FeedbackService>,
}
