use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::bearer_token;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
}

/// POST /api/v1/auth/sign-in
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    let token = state
        .auth
        .sign_in(&req.password)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create session: {e}")))?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(SignInResponse { token }))
}

/// POST /api/v1/auth/sign-out
pub async fn handle_sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    if let Some(token) = bearer_token(&headers) {
        state
            .auth
            .sign_out(token)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to end session: {e}")))?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/status
pub async fn handle_auth_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<AuthStatusResponse> {
    let session = state.session(&headers).await;
    Json(AuthStatusResponse {
        authenticated: session.authenticated,
    })
}
