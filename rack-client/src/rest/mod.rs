//! HTTP implementation of the backend boundary
//!
//! - [`RestBackend`]: end-user client (anon key + user session)
//! - [`AdminClient`]: privileged client (service-role key)

mod admin;
mod auth;
mod tables;

pub use admin::AdminClient;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{AuthBackend, EVENT_CHANNEL_CAPACITY, TableBackend};
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult};
use crate::query::{Filter, Query};
use crate::realtime::RealtimeListener;
use crate::types::{AuthEvent, AuthEventKind, ChangeEvent, Session};
use auth::AuthApi;
use tables::TablesApi;

/// Refresh this many seconds before the token actually expires
const EXPIRY_LEEWAY_SECS: i64 = 30;

pub(crate) fn build_http(config: &ClientConfig) -> BackendResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(BackendError::from)
}

/// Send a request and turn non-2xx responses into a classified error
pub(crate) async fn send(req: reqwest::RequestBuilder) -> BackendResult<reqwest::Response> {
    let response = req.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = BackendError::from_response(status.as_u16(), &body);
    tracing::debug!(status = status.as_u16(), kind = %err.kind, "Backend request rejected");
    Err(err)
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

struct RestInner {
    config: ClientConfig,
    auth: AuthApi,
    tables: TablesApi,
    session: RwLock<Option<Session>>,
    initial_emitted: AtomicBool,
    auth_tx: broadcast::Sender<AuthEvent>,
    change_tx: broadcast::Sender<ChangeEvent>,
}

/// End-user backend client
///
/// Keeps the session in memory and broadcasts auth events; cheap to clone.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestInner>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("url", &self.inner.config.url)
            .field("signed_in", &self.inner.session.read().is_some())
            .finish()
    }
}

impl RestBackend {
    pub fn new(config: ClientConfig) -> BackendResult<Self> {
        let http = build_http(&config)?;
        let (auth_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (change_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(RestInner {
                auth: AuthApi::new(http.clone(), config.clone()),
                tables: TablesApi::new(http, config.clone(), config.anon_key.clone()),
                config,
                session: RwLock::new(None),
                initial_emitted: AtomicBool::new(false),
                auth_tx,
                change_tx,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Bearer for table requests: the user's access token, else the anon key
    fn bearer(&self) -> String {
        bearer_for(&self.inner)
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        // No subscribers is fine
        let _ = self.inner.auth_tx.send(AuthEvent::new(kind, session));
    }

    /// Spawn the realtime listener feeding `subscribe_changes`
    pub fn connect_realtime(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let listener = RealtimeListener::new(
            self.inner.config.realtime_url(),
            Arc::new(move || bearer_for(&inner)),
            self.inner.change_tx.clone(),
        );
        tokio::spawn(listener.run(shutdown))
    }
}

fn bearer_for(inner: &RestInner) -> String {
    inner
        .session
        .read()
        .as_ref()
        .map(|s| s.access_token.clone())
        .unwrap_or_else(|| inner.config.anon_key.clone())
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let session = self.inner.auth.password_grant(email, password).await?;
        *self.inner.session.write() = Some(session.clone());
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let current = self.inner.session.write().take();
        self.emit(AuthEventKind::SignedOut, None);
        match current {
            Some(session) => self.inner.auth.logout(&session.access_token).await,
            None => Ok(()),
        }
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        let current = self.inner.session.read().clone();
        let now = chrono::Utc::now().timestamp();

        let resolved = match current {
            Some(session) if session.is_expired(now, EXPIRY_LEEWAY_SECS) => {
                match self.inner.auth.refresh_grant(&session.refresh_token).await {
                    Ok(fresh) => {
                        *self.inner.session.write() = Some(fresh.clone());
                        self.emit(AuthEventKind::TokenRefreshed, Some(fresh.clone()));
                        Some(fresh)
                    }
                    Err(e) if e.kind.is_unavailable() => return Err(e),
                    Err(e) => {
                        tracing::warn!(kind = %e.kind, "Session refresh rejected, signing out");
                        *self.inner.session.write() = None;
                        self.emit(AuthEventKind::SignedOut, None);
                        None
                    }
                }
            }
            other => other,
        };

        if !self.inner.initial_emitted.swap(true, Ordering::SeqCst) {
            self.emit(AuthEventKind::InitialSession, resolved.clone());
        }
        Ok(resolved)
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.auth_tx.subscribe()
    }
}

#[async_trait]
impl TableBackend for RestBackend {
    async fn select(&self, query: &Query) -> BackendResult<Vec<Value>> {
        self.inner.tables.select(query, &self.bearer()).await
    }

    async fn insert(&self, table: &str, row: Value) -> BackendResult<Vec<Value>> {
        self.inner.tables.insert(table, row, &self.bearer()).await
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Value,
    ) -> BackendResult<Vec<Value>> {
        self.inner
            .tables
            .update(table, filter, patch, &self.bearer())
            .await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> BackendResult<()> {
        self.inner.tables.delete(table, filter, &self.bearer()).await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.change_tx.subscribe()
    }
}
