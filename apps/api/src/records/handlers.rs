//! Axum route handlers for stored resume records.

use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::banding::ScoreBands;
use crate::models::record::ResumeRecord;
use crate::records::{delete_record, get_record, list_records};
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeRecord>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Complete,
}

#[derive(Debug, Serialize)]
pub struct ResumeDetailResponse {
    pub resume: ResumeRecord,
    pub status: RecordStatus,
    /// Display tiers per view; absent while feedback is pending.
    pub bands: Option<ScoreBands>,
}

/// GET /api/v1/resumes
///
/// Signed-out callers get an empty list rather than an error.
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<ResumeListResponse> {
    let session = state.session(&headers).await;
    Json(ResumeListResponse {
        resumes: list_records(&session).await,
    })
}

async fn require_record(session: &Session, id: &str) -> Result<ResumeRecord, AppError> {
    get_record(session, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ResumeDetailResponse>, AppError> {
    let session = state.session(&headers).await;
    let resume = require_record(&session, &id).await?;

    let bands = resume.feedback.as_complete().map(ScoreBands::from_feedback);
    let status = if bands.is_some() {
        RecordStatus::Complete
    } else {
        RecordStatus::Pending
    };

    Ok(Json(ResumeDetailResponse {
        resume,
        status,
        bands,
    }))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let session = state.session(&headers).await;
    delete_record(&session, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn blob_response(session: &Session, path: &str, content_type: &'static str) -> Result<Response, AppError> {
    let bytes = session
        .blobs
        .read(path)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to read blob {path}: {e}")))?
        .ok_or_else(|| AppError::NotFound(format!("Blob {path} not found")))?;
    Ok(([(CONTENT_TYPE, content_type)], bytes).into_response())
}

/// GET /api/v1/resumes/:id/document
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = state.session(&headers).await;
    let resume = require_record(&session, &id).await?;
    blob_response(&session, &resume.resume_path, "application/pdf").await
}

/// GET /api/v1/resumes/:id/preview
pub async fn handle_get_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = state.session(&headers).await;
    let resume = require_record(&session, &id).await?;
    blob_response(&session, &resume.image_path, "image/png").await
}
