//! Shared handler state

use rack_client::AdminBackend;
use shared::error::{AppError, ErrorCode};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// `None` when no service-role key is configured (development only)
    admin: Option<Arc<dyn AdminBackend>>,
}

impl AppState {
    pub fn new(admin: Arc<dyn AdminBackend>) -> Self {
        Self { admin: Some(admin) }
    }

    /// State whose admin endpoints all fail with `AdminKeyMissing`
    pub fn without_admin() -> Self {
        Self { admin: None }
    }

    pub fn admin(&self) -> Result<&Arc<dyn AdminBackend>, AppError> {
        self.admin
            .as_ref()
            .ok_or_else(|| AppError::new(ErrorCode::AdminKeyMissing))
    }
}
