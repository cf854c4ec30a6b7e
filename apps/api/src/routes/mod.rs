pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::auth::handlers as auth;
use crate::records::handlers as records;
use crate::state::AppState;

/// Headroom for the multipart framing and text fields around the file.
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_SLACK_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/sign-in", post(auth::handle_sign_in))
        .route("/api/v1/auth/sign-out", post(auth::handle_sign_out))
        .route("/api/v1/auth/status", get(auth::handle_auth_status))
        // Resumes
        .route(
            "/api/v1/resumes",
            get(records::handle_list_resumes).post(analysis::handle_submit_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(records::handle_get_resume).delete(records::handle_delete_resume),
        )
        .route(
            "/api/v1/resumes/:id/document",
            get(records::handle_get_document),
        )
        .route(
            "/api/v1/resumes/:id/preview",
            get(records::handle_get_preview),
        )
        // Submission progress
        .route(
            "/api/v1/submissions/:id",
            get(analysis::handle_submission_status).delete(analysis::handle_reset_submission),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
