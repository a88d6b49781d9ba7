//! User administration handlers
//!
//! POST /api/admin/create-user      - auth user + `users` row
//! POST /api/admin/update-password  - set a user's password
//! POST /api/admin/update-user-name - auth metadata + `users.name`

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use rack_client::{AdminUserAttributes, Filter, TableBackend};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::models::permission::deserialize_lenient;
use shared::{Permission, Role};
use shared::error::{AppError, ErrorCode};
use shared::validation::{MAX_NAME_LEN, validate_email, validate_password, validate_required_text};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// Per-page access; unknown pages are skipped
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserNameRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

/// Only template roles can be assigned
fn parse_role(value: &str) -> Result<Role, AppError> {
    validate_required_text(value, "role", MAX_NAME_LEN)?;
    let role = Role::parse(value);
    if !Role::TEMPLATES.contains(&role) {
        return Err(AppError::with_message(
            ErrorCode::InvalidFormat,
            format!("role must be one of admin, manager, viewer (got {value})"),
        )
        .with_detail("field", "role"));
    }
    Ok(role)
}

// ── POST /api/admin/create-user ──

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let email = req.email.trim().to_lowercase();
    validate_email(&email, "email")?;
    validate_password(&req.password, "password")?;
    validate_required_text(&req.name, "name", MAX_NAME_LEN)?;
    let role = parse_role(&req.role)?;
    let name = req.name.trim().to_string();

    let admin = state.admin()?;
    let attrs = AdminUserAttributes {
        email: Some(email.clone()),
        password: Some(req.password),
        email_confirm: Some(true),
        user_metadata: Some(json!({ "name": name, "role": role })),
    };
    let auth_user = admin.create_user(&attrs).await?;

    let row = json!({
        "id": auth_user.id,
        "email": email,
        "name": name,
        "role": role,
        "permissions": req.permissions,
    });
    if let Err(e) = admin.insert("users", row).await {
        tracing::warn!(user_id = %auth_user.id, kind = %e.kind, "Auth user created but users row failed: {}", e.message);
    }

    tracing::info!(user_id = %auth_user.id, %role, "User created");
    let user = CreatedUser {
        id: auth_user.id,
        email,
        name,
        role,
        permissions: req.permissions,
    };
    Ok(Json(json!({ "success": true, "user": user })))
}

// ── POST /api/admin/update-password ──

pub async fn update_password(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    validate_required_text(&req.user_id, "userId", MAX_NAME_LEN)?;
    validate_password(&req.new_password, "newPassword")?;

    let admin = state.admin()?;
    admin
        .update_user_by_id(
            &req.user_id,
            &AdminUserAttributes {
                password: Some(req.new_password),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(user_id = %req.user_id, "Password updated");
    Ok(Json(json!({ "success": true })))
}

// ── POST /api/admin/update-user-name ──

pub async fn update_user_name(
    State(state): State<AppState>,
    payload: Result<Json<UpdateUserNameRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    validate_required_text(&req.user_id, "userId", MAX_NAME_LEN)?;
    validate_required_text(&req.name, "name", MAX_NAME_LEN)?;
    let name = req.name.trim().to_string();

    let admin = state.admin()?;
    admin
        .update_user_by_id(
            &req.user_id,
            &AdminUserAttributes {
                user_metadata: Some(json!({ "name": name })),
                ..Default::default()
            },
        )
        .await?;

    if let Err(e) = admin
        .update("users", &Filter::eq("id", req.user_id.as_str()), json!({ "name": name }))
        .await
    {
        tracing::warn!(user_id = %req.user_id, kind = %e.kind, "Auth metadata updated but users row failed: {}", e.message);
    }

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role(" Manager ").unwrap(), Role::Manager);
        assert_eq!(parse_role("owner").unwrap_err().code, ErrorCode::InvalidFormat);
        assert_eq!(parse_role("").unwrap_err().code, ErrorCode::RequiredField);
    }
}
