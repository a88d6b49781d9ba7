//! POST /api/auth/verify-password
//!
//! Checks a password with a throwaway sign-in; no session is kept.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::{Value, json};
use shared::validation::{MAX_PASSWORD_LEN, validate_email, validate_required_text};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn verify_password(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPasswordRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let email = req.email.trim().to_lowercase();
    validate_email(&email, "email")?;
    validate_required_text(&req.password, "password", MAX_PASSWORD_LEN)?;

    state.admin()?.verify_password(&email, &req.password).await?;

    Ok(Json(json!({ "success": true, "message": "Password verified" })))
}
