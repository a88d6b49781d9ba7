//! API routes for rack-admin

pub mod auth;
pub mod health;
pub mod users;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/admin/create-user", post(users::create_user))
        .route("/api/admin/update-password", post(users::update_password))
        .route("/api/admin/update-user-name", post(users::update_user_name));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/verify-password", post(auth::verify_password))
        .merge(admin)
        .with_state(state)
}
