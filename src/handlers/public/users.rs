// handlers/public/users.rs - Account creation and token acquisition

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;

use crate::database::models::User;
use crate::handlers::extract::parse_body;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{LoginRequest, Session, SignupRequest};
use crate::state::AppState;

/// POST /api/users/signup - register and receive a token
///
/// Body: `{"username": string, "email": string, "password": string}`
pub async fn user_signup(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Session> {
    let request: SignupRequest = parse_body(body, &["username", "email", "password"])?;
    let session = state.accounts.signup(request).await?;
    Ok(ApiResponse::created(session))
}

/// POST /api/users/login - exchange credentials for a token
pub async fn user_login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Session> {
    let request: LoginRequest = parse_body(body, &["email", "password"])?;
    let session = state.accounts.login(request).await?;
    Ok(ApiResponse::success(session))
}

/// GET /api/users - every user, credentials stripped
pub async fn users_list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.accounts.list_users().await?))
}
