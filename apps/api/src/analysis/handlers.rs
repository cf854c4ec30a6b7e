//! Axum route handlers for submitting resumes and polling their progress.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::pipeline::{run_analysis, PipelineError, Submission};
use crate::analysis::progress::SubmissionStatus;
use crate::analysis::stage::Stage;
use crate::errors::AppError;
use crate::state::AppState;
use crate::stores::UploadFile;

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: Uuid,
}

/// Only PDFs within the size cap are accepted.
fn validate_document(document: &UploadFile, max_bytes: usize) -> Result<(), AppError> {
    let is_pdf = document.content_type == PDF_CONTENT_TYPE
        || document.name.to_ascii_lowercase().ends_with(".pdf");
    if !is_pdf {
        return Err(AppError::Validation(
            "Only PDF resumes are supported".to_string(),
        ));
    }
    if document.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if document.bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Resume exceeds the {max_bytes} byte limit"
        )));
    }
    Ok(())
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Malformed multipart body: {e}"))
    };

    let mut document = None;
    let mut company_name = String::new();
    let mut job_title = String::new();
    let mut job_description = String::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(PDF_CONTENT_TYPE)
                    .to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                document = Some(UploadFile::new(file_name, content_type, bytes));
            }
            "company-name" => company_name = field.text().await.map_err(malformed)?,
            "job-title" => job_title = field.text().await.map_err(malformed)?,
            "job-description" => job_description = field.text().await.map_err(malformed)?,
            _ => {}
        }
    }

    let document = document
        .ok_or_else(|| AppError::Validation("Please upload a PDF resume".to_string()))?;

    Ok(Submission {
        document,
        company_name,
        job_title,
        job_description,
    })
}

/// POST /api/v1/resumes
///
/// Starts the analysis pipeline in the background and returns a submission id
/// to poll. Fields: `file`, `company-name`, `job-title`, `job-description`.
pub async fn handle_submit_resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let session = state.session(&headers).await;
    if !session.authenticated {
        return Err(AppError::Unauthorized);
    }

    let submission = read_submission(multipart).await?;
    validate_document(&submission.document, state.config.max_upload_bytes)?;

    let submission_id = state.submissions.begin();
    let tracker = Arc::clone(&state.submissions);
    info!(
        "Submission {submission_id} accepted ('{}', {} bytes)",
        submission.document.name,
        submission.document.bytes.len()
    );

    tokio::spawn(async move {
        let progress = tracker.sink(submission_id);
        let run = tokio::spawn(async move { run_analysis(&session, submission, &progress).await });

        match run.await {
            Ok(Ok(resume_id)) => tracker.complete(submission_id, resume_id),
            Ok(Err(e)) => {
                warn!("Submission {submission_id} failed at stage {}: {e}", e.stage().index());
                tracker.fail(submission_id, e.user_message());
            }
            Err(join_error) => {
                error!("Submission {submission_id} aborted: {join_error}");
                let stage = tracker
                    .get(submission_id)
                    .and_then(|s| s.stage)
                    .unwrap_or(Stage::UploadOriginal);
                tracker.fail(submission_id, PipelineError::Unhandled(stage).user_message());
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { submission_id })))
}

/// GET /api/v1/submissions/:id
pub async fn handle_submission_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SubmissionStatus>, AppError> {
    if !state.session(&headers).await.authenticated {
        return Err(AppError::Unauthorized);
    }
    state
        .submissions
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))
}

/// DELETE /api/v1/submissions/:id
///
/// Clears a failed (or finished) submission so the client can start over.
pub async fn handle_reset_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    if !state.session(&headers).await.authenticated {
        return Err(AppError::Unauthorized);
    }
    if state.submissions.reset(id) {
        return Ok(StatusCode::NO_CONTENT);
    }
    match state.submissions.get(id) {
        Some(_) => Err(AppError::Conflict(format!("Submission {id} is still running"))),
        None => Err(AppError::NotFound(format!("Submission {id} not found"))),
    }
}
