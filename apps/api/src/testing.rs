//! Fakes shared by the unit tests: in-memory stores with failure injection,
//! a scripted converter and AI service, and a recording progress sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;

use crate::analysis::ai::{tests::sample_feedback_json, AiResponse, FeedbackService};
use crate::analysis::pipeline::Submission;
use crate::analysis::progress::{ProgressSink, SubmissionTracker};
use crate::analysis::stage::Stage;
use crate::auth::KvSessionAuth;
use crate::config::{Config, StorageBackend};
use crate::models::record::{record_key, ResumeRecord};
use crate::preview::PreviewConverter;
use crate::session::Session;
use crate::state::AppState;
use crate::stores::memory::{MemoryBlobStore, MemoryKvStore};
use crate::stores::{BlobStore, KvEntry, KvStore, StoredBlob, UploadFile};

pub fn submission(company: &str, title: &str, description: &str) -> Submission {
    Submission {
        document: UploadFile::new(
            "resume.pdf",
            "application/pdf",
            Bytes::from_static(b"%PDF-1.7 test resume"),
        ),
        company_name: company.to_string(),
        job_title: title.to_string(),
        job_description: description.to_string(),
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    stages: Mutex<Vec<Stage>>,
}

impl RecordingProgress {
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_stage(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
}

/// Memory blob store that declines the Nth upload (1-based).
pub struct FlakyBlobStore {
    inner: Arc<MemoryBlobStore>,
    fail_at: Option<usize>,
    uploads: AtomicUsize,
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn upload(&self, file: &UploadFile) -> Result<Option<StoredBlob>> {
        let call = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at == Some(call) {
            return Ok(None);
        }
        self.inner.upload(file).await
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        self.inner.read(path).await
    }
}

/// Memory key-value store whose Nth write (1-based) errors.
pub struct FlakyKvStore {
    inner: Arc<MemoryKvStore>,
    fail_at: usize,
    writes: AtomicUsize,
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let call = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_at {
            return Err(anyhow!("READONLY replica"));
        }
        self.inner.set(key, value).await
    }

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.inner.set_with_expiry(key, value, ttl).await
    }

    async fn list(&self, pattern: &str, with_values: bool) -> Result<Vec<KvEntry>> {
        self.inner.list(pattern, with_values).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
}

/// Key-value store whose every call errors.
pub struct BrokenKvStore;

#[async_trait]
impl KvStore for BrokenKvStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("connection refused"))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn set_with_expiry(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn list(&self, _pattern: &str, _with_values: bool) -> Result<Vec<KvEntry>> {
        Err(anyhow!("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

pub struct FakeConverter {
    produce: bool,
    calls: AtomicUsize,
}

impl FakeConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreviewConverter for FakeConverter {
    async fn convert(&self, _document: &UploadFile) -> Result<Option<UploadFile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.produce.then(|| {
            UploadFile::new("resume.png", "image/png", Bytes::from_static(b"\x89PNG preview"))
        }))
    }
}

enum Reply {
    Answer(Option<AiResponse>),
    Error,
}

pub struct FakeAi {
    reply: Reply,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeAi {
    /// Every `(document_path, instructions)` pair received so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackService for FakeAi {
    async fn feedback(&self, document_path: &str, instructions: &str) -> Result<Option<AiResponse>> {
        self.calls
            .lock()
            .unwrap()
            .push((document_path.to_string(), instructions.to_string()));
        match &self.reply {
            Reply::Answer(answer) => Ok(answer.clone()),
            Reply::Error => Err(anyhow!("upstream 529 overloaded")),
        }
    }
}

/// A full set of collaborators for pipeline and record tests.
pub struct TestRig {
    pub blobs: Arc<MemoryBlobStore>,
    pub kv: Arc<MemoryKvStore>,
    pub converter: Arc<FakeConverter>,
    pub ai: Arc<FakeAi>,
    fail_upload_at: Option<usize>,
    broken_kv: bool,
    fail_kv_set_at: Option<usize>,
    authenticated: bool,
}

impl TestRig {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            kv: Arc::new(MemoryKvStore::new()),
            converter: Arc::new(FakeConverter {
                produce: true,
                calls: AtomicUsize::new(0),
            }),
            ai: Arc::new(FakeAi {
                reply: Reply::Answer(Some(AiResponse::from_text(sample_feedback_json()))),
                calls: Mutex::new(Vec::new()),
            }),
            fail_upload_at: None,
            broken_kv: false,
            fail_kv_set_at: None,
            authenticated: true,
        }
    }

    pub fn fail_upload_at(mut self, call: usize) -> Self {
        self.fail_upload_at = Some(call);
        self
    }

    pub fn without_preview(mut self) -> Self {
        self.converter = Arc::new(FakeConverter {
            produce: false,
            calls: AtomicUsize::new(0),
        });
        self
    }

    pub fn with_ai_reply(mut self, reply: Option<AiResponse>) -> Self {
        self.ai = Arc::new(FakeAi {
            reply: Reply::Answer(reply),
            calls: Mutex::new(Vec::new()),
        });
        self
    }

    pub fn with_ai_error(mut self) -> Self {
        self.ai = Arc::new(FakeAi {
            reply: Reply::Error,
            calls: Mutex::new(Vec::new()),
        });
        self
    }

    pub fn with_broken_kv(mut self) -> Self {
        self.broken_kv = true;
        self
    }

    /// Makes the Nth key-value write of each session fail.
    pub fn fail_kv_set_at(mut self, call: usize) -> Self {
        self.fail_kv_set_at = Some(call);
        self
    }

    pub fn signed_out(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn session(&self) -> Session {
        let blobs: Arc<dyn BlobStore> = match self.fail_upload_at {
            Some(n) => Arc::new(FlakyBlobStore {
                inner: Arc::clone(&self.blobs),
                fail_at: Some(n),
                uploads: AtomicUsize::new(0),
            }),
            None => self.blobs.clone(),
        };
        let kv: Arc<dyn KvStore> = match (self.broken_kv, self.fail_kv_set_at) {
            (true, _) => Arc::new(BrokenKvStore),
            (false, Some(n)) => Arc::new(FlakyKvStore {
                inner: Arc::clone(&self.kv),
                fail_at: n,
                writes: AtomicUsize::new(0),
            }),
            (false, None) => self.kv.clone(),
        };
        Session {
            authenticated: self.authenticated,
            blobs,
            kv,
            converter: self.converter.clone(),
            ai: self.ai.clone(),
        }
    }

    /// Application state over the rig's collaborators, for router tests.
    /// Sign in with [`TEST_PASSWORD`].
    pub fn app_state(&self) -> AppState {
        let session = self.session();
        AppState {
            auth: Arc::new(KvSessionAuth::new(
                session.kv.clone(),
                TEST_PASSWORD.to_string(),
            )),
            blobs: session.blobs,
            kv: session.kv,
            converter: session.converter,
            ai: session.ai,
            submissions: Arc::new(SubmissionTracker::new()),
            config: test_config(),
        }
    }

    pub async fn record(&self, id: &str) -> ResumeRecord {
        let raw = self.kv.get(&record_key(id)).await.unwrap().unwrap();
        ResumeRecord::from_json(&raw).unwrap()
    }
}

pub const TEST_PASSWORD: &str = "letmein";

pub fn test_config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        redis_url: String::new(),
        s3_bucket: String::new(),
        s3_endpoint: String::new(),
        aws_access_key_id: String::new(),
        aws_secret_access_key: String::new(),
        anthropic_api_key: String::new(),
        access_password: TEST_PASSWORD.to_string(),
        pdfium_lib_dir: None,
        max_upload_bytes: 1024 * 1024,
        collaborator_timeout: None,
        port: 0,
        rust_log: "debug".to_string(),
    }
}
