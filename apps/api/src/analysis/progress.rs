//! Progress reporting for pipeline runs.
//!
//! The pipeline reports each stage through a [`ProgressSink`] as the stage
//! starts. [`SubmissionTracker`] is the sink used by the HTTP layer: it keeps
//! the latest state of every submission in memory so clients can poll it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::stage::Stage;

/// Receives the current stage of a single pipeline run.
pub trait ProgressSink: Send + Sync {
    fn on_stage(&self, stage: Stage);
}

/// Finished submissions are forgotten after this long.
const RETAIN_FINISHED_MINUTES: i64 = 60;
/// A submission still processing with no stage change for this long belongs
/// to a task that died without reporting.
const RETAIN_STALLED_MINUTES: i64 = 6 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Processing,
    Failed,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionStatus {
    pub submission_id: Uuid,
    pub state: SubmissionState,
    pub stage: Option<Stage>,
    pub stage_index: Option<usize>,
    pub stage_label: Option<&'static str>,
    pub progress: f32,
    pub error: Option<String>,
    pub resume_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionStatus {
    fn new(submission_id: Uuid) -> Self {
        Self {
            submission_id,
            state: SubmissionState::Processing,
            stage: None,
            stage_index: None,
            stage_label: None,
            progress: 0.0,
            error: None,
            resume_id: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Default)]
pub struct SubmissionTracker {
    submissions: Mutex<HashMap<Uuid, SubmissionStatus>>,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SubmissionStatus>> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new submission and returns its id.
    pub fn begin(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut submissions = self.lock();
        let now = Utc::now();
        let finished_cutoff = now - Duration::minutes(RETAIN_FINISHED_MINUTES);
        let stalled_cutoff = now - Duration::minutes(RETAIN_STALLED_MINUTES);
        submissions.retain(|_, s| match s.state {
            SubmissionState::Processing => s.updated_at > stalled_cutoff,
            _ => s.updated_at > finished_cutoff,
        });
        submissions.insert(id, SubmissionStatus::new(id));
        id
    }

    pub fn get(&self, id: Uuid) -> Option<SubmissionStatus> {
        self.lock().get(&id).cloned()
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut SubmissionStatus)) {
        if let Some(status) = self.lock().get_mut(&id) {
            apply(status);
            status.updated_at = Utc::now();
        }
    }

    pub fn record_stage(&self, id: Uuid, stage: Stage) {
        self.update(id, |s| {
            s.stage = Some(stage);
            s.stage_index = Some(stage.index());
            s.stage_label = Some(stage.label());
            s.progress = stage.progress();
        });
    }

    pub fn complete(&self, id: Uuid, resume_id: String) {
        self.update(id, |s| {
            s.state = SubmissionState::Complete;
            s.progress = 1.0;
            s.resume_id = Some(resume_id);
        });
    }

    pub fn fail(&self, id: Uuid, message: &str) {
        self.update(id, |s| {
            s.state = SubmissionState::Failed;
            s.error = Some(message.to_string());
        });
    }

    /// Clears a finished submission so the caller can start over.
    /// Returns false when the submission is unknown or still running.
    pub fn reset(&self, id: Uuid) -> bool {
        let mut submissions = self.lock();
        match submissions.get(&id) {
            Some(s) if s.state != SubmissionState::Processing => {
                submissions.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// A sink that records stages for one submission.
    pub fn sink(self: &Arc<Self>, id: Uuid) -> TrackedProgress {
        TrackedProgress {
            tracker: Arc::clone(self),
            id,
        }
    }
}

pub struct TrackedProgress {
    tracker: Arc<SubmissionTracker>,
    id: Uuid,
}

impl ProgressSink for TrackedProgress {
    fn on_stage(&self, stage: Stage) {
        self.tracker.record_stage(self.id, stage);
    }
}
