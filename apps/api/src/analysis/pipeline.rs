//! The analysis pipeline: six strictly sequential stages taking an uploaded
//! resume to a persisted, scored record.
//!
//! Fail-fast: the first failing stage ends the run with one user-facing
//! error. Nothing already persisted is rolled back, so a run that dies after
//! the provisional write leaves a pending record behind. Blobs are never
//! reclaimed here.

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::ai::parse_feedback;
use crate::analysis::progress::ProgressSink;
use crate::analysis::prompts::prepare_instructions;
use crate::analysis::stage::Stage;
use crate::models::feedback::FeedbackState;
use crate::models::record::ResumeRecord;
use crate::session::Session;
use crate::stores::UploadFile;

/// One resume submission: the document plus optional job context.
/// Empty context strings are stored as-is.
#[derive(Debug, Clone)]
pub struct Submission {
    pub document: UploadFile,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("upload failed during {0:?}")]
    UploadFailed(Stage),

    #[error("preview generation failed")]
    PreviewGenerationFailed,

    #[error("AI analysis failed")]
    AnalysisFailed,

    #[error("unexpected failure during {0:?}")]
    Unhandled(Stage),
}

impl PipelineError {
    /// The message shown to the submitter. Internal details are only logged.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::UploadFailed(Stage::UploadPreview) => "Failed to upload preview image.",
            PipelineError::UploadFailed(_) => "Failed to upload resume. Please try again.",
            PipelineError::PreviewGenerationFailed => "Failed to generate resume preview.",
            PipelineError::AnalysisFailed => "AI analysis failed. Please retry.",
            PipelineError::Unhandled(_) => "Something went wrong. Please try again.",
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::UploadFailed(stage) | PipelineError::Unhandled(stage) => *stage,
            PipelineError::PreviewGenerationFailed => Stage::GeneratePreview,
            PipelineError::AnalysisFailed => Stage::AiAnalyze,
        }
    }
}

fn unhandled(stage: Stage) -> impl FnOnce(anyhow::Error) -> PipelineError {
    move |e| {
        error!("{} stage failed unexpectedly: {e:?}", stage.label());
        PipelineError::Unhandled(stage)
    }
}

async fn persist(session: &Session, record: &ResumeRecord, stage: Stage) -> Result<(), PipelineError> {
    let raw = record
        .to_json()
        .map_err(|e| unhandled(stage)(anyhow::Error::from(e)))?;
    session.kv.set(&record.key(), raw).await.map_err(unhandled(stage))
}

/// Runs one submission through every stage and returns the new record's id.
///
/// `progress` is told about each stage exactly once, as it starts.
pub async fn run_analysis(
    session: &Session,
    submission: Submission,
    progress: &dyn ProgressSink,
) -> Result<String, PipelineError> {
    let Submission {
        document,
        company_name,
        job_title,
        job_description,
    } = submission;

    // 0. Original document
    progress.on_stage(Stage::UploadOriginal);
    let resume = session
        .blobs
        .upload(&document)
        .await
        .map_err(unhandled(Stage::UploadOriginal))?
        .ok_or_else(|| {
            warn!("Blob store rejected resume '{}'", document.name);
            PipelineError::UploadFailed(Stage::UploadOriginal)
        })?;
    info!("Uploaded resume '{}' to {}", document.name, resume.path);

    // 1. Preview image
    progress.on_stage(Stage::GeneratePreview);
    let preview = session
        .converter
        .convert(&document)
        .await
        .map_err(unhandled(Stage::GeneratePreview))?
        .ok_or_else(|| {
            warn!("No preview produced for '{}'", document.name);
            PipelineError::PreviewGenerationFailed
        })?;

    // 2. Preview upload
    progress.on_stage(Stage::UploadPreview);
    let image = session
        .blobs
        .upload(&preview)
        .await
        .map_err(unhandled(Stage::UploadPreview))?
        .ok_or_else(|| {
            warn!("Blob store rejected preview '{}'", preview.name);
            PipelineError::UploadFailed(Stage::UploadPreview)
        })?;

    // 3. Provisional record, visible to listings while scoring runs
    progress.on_stage(Stage::PersistProvisional);
    let mut record = ResumeRecord {
        id: Uuid::new_v4().to_string(),
        resume_path: resume.path,
        image_path: image.path,
        company_name,
        job_title,
        job_description,
        feedback: FeedbackState::Pending,
    };
    persist(session, &record, Stage::PersistProvisional).await?;
    info!("Saved provisional record {}", record.id);

    // 4. AI scoring
    progress.on_stage(Stage::AiAnalyze);
    let instructions = prepare_instructions(&record.job_title, &record.job_description);
    let reply = session
        .ai
        .feedback(&record.resume_path, &instructions)
        .await
        .map_err(unhandled(Stage::AiAnalyze))?
        .ok_or_else(|| {
            warn!("AI service returned no feedback for record {}", record.id);
            PipelineError::AnalysisFailed
        })?;
    let feedback = parse_feedback(&reply).map_err(|e| {
        error!("Could not parse AI feedback for record {}: {e}", record.id);
        PipelineError::AnalysisFailed
    })?;

    // 5. Final record
    progress.on_stage(Stage::PersistFinal);
    record.feedback = FeedbackState::Complete(feedback);
    persist(session, &record, Stage::PersistFinal).await?;
    info!("Analysis complete for record {}", record.id);

    Ok(record.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ai::tests::sample_feedback_json;
    use crate::analysis::ai::AiResponse;
    use crate::models::feedback::tests::sample_feedback;
    use crate::models::record::record_key;
    use crate::stores::KvStore;
    use crate::testing::{submission, RecordingProgress, TestRig};

    #[tokio::test]
    async fn test_successful_run_persists_complete_record() {
        let rig = TestRig::new();
        let progress = RecordingProgress::default();

        let id = run_analysis(&rig.session(), submission("Acme", "SRE", "Keep it up"), &progress)
            .await
            .unwrap();

        assert!(!id.is_empty());
        let raw = rig.kv.get(&record_key(&id)).await.unwrap().unwrap();
        let record = ResumeRecord::from_json(&raw).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.feedback, FeedbackState::Complete(sample_feedback()));
        assert_eq!(record.company_name, "Acme");
        assert_eq!(rig.blobs.len().await, 2);
        assert_eq!(progress.stages(), Stage::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_ai_receives_resume_path_and_job_context() {
        let rig = TestRig::new();
        let id = run_analysis(
            &rig.session(),
            submission("Acme", "Platform Engineer", "Own the Kubernetes fleet"),
            &RecordingProgress::default(),
        )
        .await
        .unwrap();

        let record = rig.record(&id).await;
        let calls = rig.ai.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, record.resume_path);
        assert!(calls[0].1.contains("Platform Engineer"));
        assert!(calls[0].1.contains("Own the Kubernetes fleet"));
    }

    #[tokio::test]
    async fn test_resubmission_creates_new_record() {
        let rig = TestRig::new();
        let first = run_analysis(&rig.session(), submission("", "", ""), &RecordingProgress::default())
            .await
            .unwrap();
        let second = run_analysis(&rig.session(), submission("", "", ""), &RecordingProgress::default())
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(rig.kv.list("resume:*", false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_context_is_stored_verbatim() {
        let rig = TestRig::new();
        let id = run_analysis(&rig.session(), submission("", "", ""), &RecordingProgress::default())
            .await
            .unwrap();

        let record = rig.record(&id).await;
        assert_eq!(record.company_name, "");
        assert_eq!(record.job_title, "");
        assert_eq!(record.job_description, "");
        assert!(!record.feedback.is_pending());
    }

    #[tokio::test]
    async fn test_original_upload_failure_halts_at_stage_0() {
        let rig = TestRig::new().fail_upload_at(1);
        let progress = RecordingProgress::default();

        let err = run_analysis(&rig.session(), submission("Acme", "SRE", ""), &progress)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::UploadFailed(Stage::UploadOriginal));
        assert_eq!(err.user_message(), "Failed to upload resume. Please try again.");
        assert_eq!(progress.stages(), vec![Stage::UploadOriginal]);
        assert_eq!(rig.converter.calls(), 0);
        assert!(rig.kv.list("*", false).await.unwrap().is_empty());
        assert!(rig.ai.calls().is_empty());
    }

    #[tokio::test]
    async fn test_preview_upload_failure_halts_at_stage_2() {
        let rig = TestRig::new().fail_upload_at(2);
        let progress = RecordingProgress::default();

        let err = run_analysis(&rig.session(), submission("Acme", "SRE", ""), &progress)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::UploadFailed(Stage::UploadPreview));
        assert_eq!(err.user_message(), "Failed to upload preview image.");
        assert_eq!(err.stage().index(), 2);
        assert_eq!(progress.stages(), Stage::ALL[..3].to_vec());
        assert_eq!(rig.converter.calls(), 1);
        assert!(rig.kv.list("*", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_preview_halts_at_stage_1() {
        let rig = TestRig::new().without_preview();
        let progress = RecordingProgress::default();

        let err = run_analysis(&rig.session(), submission("", "", ""), &progress)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::PreviewGenerationFailed);
        assert_eq!(err.user_message(), "Failed to generate resume preview.");
        assert_eq!(progress.stages(), Stage::ALL[..2].to_vec());
        assert_eq!(rig.blobs.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_ai_reply_leaves_pending_record() {
        let rig = TestRig::new().with_ai_reply(None);
        let progress = RecordingProgress::default();

        let err = run_analysis(&rig.session(), submission("Acme", "SRE", ""), &progress)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::AnalysisFailed);
        assert_eq!(err.user_message(), "AI analysis failed. Please retry.");
        assert_eq!(progress.stages(), Stage::ALL[..5].to_vec());

        let entries = rig.kv.list("resume:*", true).await.unwrap();
        assert_eq!(entries.len(), 1);
        let record = ResumeRecord::from_json(entries[0].value.as_deref().unwrap()).unwrap();
        assert!(record.feedback.is_pending());
    }

    #[tokio::test]
    async fn test_unparseable_ai_reply_is_analysis_failure() {
        let rig = TestRig::new().with_ai_reply(Some(AiResponse::from_text("I liked it!")));

        let err = run_analysis(&rig.session(), submission("", "", ""), &RecordingProgress::default())
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::AnalysisFailed);
    }

    #[tokio::test]
    async fn test_fenced_ai_reply_is_accepted() {
        let fenced = format!("```json\n{}\n```", sample_feedback_json());
        let rig = TestRig::new().with_ai_reply(Some(AiResponse::from_text(fenced)));

        let id = run_analysis(&rig.session(), submission("", "", ""), &RecordingProgress::default())
            .await
            .unwrap();
        assert_eq!(
            rig.record(&id).await.feedback,
            FeedbackState::Complete(sample_feedback())
        );
    }

    #[tokio::test]
    async fn test_ai_error_is_unhandled_failure() {
        let rig = TestRig::new().with_ai_error();

        let err = run_analysis(&rig.session(), submission("", "", ""), &RecordingProgress::default())
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::Unhandled(Stage::AiAnalyze));
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
    }

    #[tokio::test]
    async fn test_kv_error_is_unhandled_failure_before_scoring() {
        let rig = TestRig::new().with_broken_kv();
        let progress = RecordingProgress::default();

        let err = run_analysis(&rig.session(), submission("", "", ""), &progress)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::Unhandled(Stage::PersistProvisional));
        assert_eq!(progress.stages(), Stage::ALL[..4].to_vec());
        assert!(rig.ai.calls().is_empty());
    }

    #[tokio::test]
    async fn test_final_write_failure_leaves_pending_record() {
        let rig = TestRig::new().fail_kv_set_at(2);
        let progress = RecordingProgress::default();

        let err = run_analysis(&rig.session(), submission("Acme", "SRE", ""), &progress)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::Unhandled(Stage::PersistFinal));
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert_eq!(progress.stages(), Stage::ALL.to_vec());
        assert_eq!(rig.ai.calls().len(), 1);

        let entries = rig.kv.list("resume:*", true).await.unwrap();
        assert_eq!(entries.len(), 1);
        let record = ResumeRecord::from_json(entries[0].value.as_deref().unwrap()).unwrap();
        assert!(record.feedback.is_pending());
    }
}
