//! Backend boundary traits
//!
//! ```text
//!        ┌──────────────┐   ┌───────────────┐
//!        │ AuthBackend  │   │ TableBackend  │
//!        └──────┬───────┘   └──┬─────────┬──┘
//!               └──── Backend ─┘         │
//!                         │         AdminBackend
//!                ┌────────┴───────┐      │
//!                ▼                ▼      ▼
//!           RestBackend     MemoryBackend  AdminClient
//! ```
//!
//! Controllers hold an `Arc<dyn Backend>` injected at construction.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::BackendResult;
use crate::query::{Filter, Query};
use crate::types::{AdminUserAttributes, AuthEvent, AuthUser, ChangeEvent, Session};

/// Capacity of the auth and change event channels
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Sign-in / sign-out against the auth provider
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Password sign-in. On success the backend also emits `SignedIn`.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session>;

    /// Invalidate the current session. Emits `SignedOut`.
    async fn sign_out(&self) -> BackendResult<()>;

    /// Current session, refreshed if it has expired
    async fn get_session(&self) -> BackendResult<Option<Session>>;

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Row access on the database tables
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn select(&self, query: &Query) -> BackendResult<Vec<Value>>;

    /// Insert one row, returning the stored representation
    async fn insert(&self, table: &str, row: Value) -> BackendResult<Vec<Value>>;

    async fn update(&self, table: &str, filter: &Filter, patch: Value)
    -> BackendResult<Vec<Value>>;

    async fn delete(&self, table: &str, filter: &Filter) -> BackendResult<()>;

    /// Row change notifications for every public table
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Everything the console controllers need
pub trait Backend: AuthBackend + TableBackend {}

impl<T: AuthBackend + TableBackend> Backend for T {}

/// Privileged user administration (service-role key)
#[async_trait]
pub trait AdminBackend: TableBackend {
    async fn create_user(&self, attrs: &AdminUserAttributes) -> BackendResult<AuthUser>;

    async fn update_user_by_id(
        &self,
        user_id: &str,
        attrs: &AdminUserAttributes,
    ) -> BackendResult<AuthUser>;

    /// Check an email/password pair without keeping the session
    async fn verify_password(&self, email: &str, password: &str) -> BackendResult<()>;
}
