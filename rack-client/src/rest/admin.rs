//! Privileged admin client

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use super::auth::AuthApi;
use super::tables::TablesApi;
use super::build_http;
use crate::backend::{AdminBackend, EVENT_CHANNEL_CAPACITY, TableBackend};
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendErrorKind, BackendResult};
use crate::query::{Filter, Query};
use crate::types::{AdminUserAttributes, AuthUser, ChangeEvent};

/// Backend client authenticated with the service-role key.
///
/// Never hand this to end-user code: the key bypasses row-level security.
#[derive(Clone)]
pub struct AdminClient {
    auth: AuthApi,
    tables: TablesApi,
    service_key: String,
    change_tx: broadcast::Sender<ChangeEvent>,
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient").finish_non_exhaustive()
    }
}

impl AdminClient {
    /// Fails with `Unauthorized` when no service-role key is configured
    pub fn new(config: ClientConfig) -> BackendResult<Self> {
        let service_key = config.service_role_key.clone().ok_or_else(|| {
            BackendError::new(
                BackendErrorKind::Unauthorized,
                "SUPABASE_SERVICE_ROLE_KEY is not configured",
            )
        })?;
        let http = build_http(&config)?;
        let (change_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            auth: AuthApi::new(http.clone(), config.clone()),
            tables: TablesApi::new(http, config, service_key.clone()),
            service_key,
            change_tx,
        })
    }
}

#[async_trait]
impl TableBackend for AdminClient {
    async fn select(&self, query: &Query) -> BackendResult<Vec<Value>> {
        self.tables.select(query, &self.service_key).await
    }

    async fn insert(&self, table: &str, row: Value) -> BackendResult<Vec<Value>> {
        self.tables.insert(table, row, &self.service_key).await
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Value,
    ) -> BackendResult<Vec<Value>> {
        self.tables
            .update(table, filter, patch, &self.service_key)
            .await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> BackendResult<()> {
        self.tables.delete(table, filter, &self.service_key).await
    }

    /// The admin client has no realtime connection; the receiver never fires
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_tx.subscribe()
    }
}

#[async_trait]
impl AdminBackend for AdminClient {
    async fn create_user(&self, attrs: &AdminUserAttributes) -> BackendResult<AuthUser> {
        self.auth.admin_create_user(&self.service_key, attrs).await
    }

    async fn update_user_by_id(
        &self,
        user_id: &str,
        attrs: &AdminUserAttributes,
    ) -> BackendResult<AuthUser> {
        self.auth
            .admin_update_user(&self.service_key, user_id, attrs)
            .await
    }

    async fn verify_password(&self, email: &str, password: &str) -> BackendResult<()> {
        let session = self.auth.password_grant(email, password).await?;
        if let Err(e) = self.auth.logout(&session.access_token).await {
            tracing::warn!(kind = %e.kind, "Failed to close verification session");
        }
        Ok(())
    }
}
