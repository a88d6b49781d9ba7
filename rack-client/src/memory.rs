//! In-process backend for tests and offline demos
//!
//! Tables are plain `Vec<Value>` per name. Embedded joins are not
//! evaluated: seed rows with their nested arrays (e.g. `rack_products`)
//! already in place.
//!
//! Responses are computed when the call is made and delivered after the
//! configured latency, so a slow call returns the data as it was at call
//! time.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::backend::{AdminBackend, AuthBackend, EVENT_CHANNEL_CAPACITY, TableBackend};
use crate::error::{BackendError, BackendErrorKind, BackendResult};
use crate::query::{Filter, Query};
use crate::types::{
    AdminUserAttributes, AuthEvent, AuthEventKind, AuthUser, ChangeEvent, ChangeKind, Session,
};

/// Pseudo table name used for auth operations in counters and failures
pub const AUTH: &str = "auth";

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
    SignIn,
    SignOut,
    GetSession,
    CreateUser,
    UpdateUser,
    VerifyPassword,
}

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by email
    accounts: HashMap<String, Account>,
    tables: HashMap<String, Vec<Value>>,
    session: Option<Session>,
    failures: HashMap<(String, Op), BackendError>,
    calls: HashMap<(String, Op), usize>,
    latency: Option<Duration>,
}

impl MemoryState {
    fn enter(&mut self, table: &str, op: Op) -> BackendResult<()> {
        *self.calls.entry((table.to_string(), op)).or_default() += 1;
        match self.failures.get(&(table.to_string(), op)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    initial_emitted: AtomicBool,
    auth_tx: broadcast::Sender<AuthEvent>,
    change_tx: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (auth_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (change_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(MemoryState::default()),
            initial_emitted: AtomicBool::new(false),
            auth_tx,
            change_tx,
        }
    }

    // ========== Scripting ==========

    pub fn add_account(&self, id: &str, email: &str, password: &str) -> AuthUser {
        let user = AuthUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            user_metadata: Value::Object(Map::new()),
        };
        self.state.lock().accounts.insert(
            email.to_lowercase(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Replace the contents of a table
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.state.lock().tables.insert(table.to_string(), rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every `op` on `table` fail with `err` until cleared
    pub fn fail(&self, table: &str, op: Op, err: BackendError) {
        self.state
            .lock()
            .failures
            .insert((table.to_string(), op), err);
    }

    pub fn clear_failure(&self, table: &str, op: Op) {
        self.state.lock().failures.remove(&(table.to_string(), op));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Delay applied to every call after its response is computed
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().latency = latency;
    }

    pub fn calls(&self, table: &str, op: Op) -> usize {
        self.state
            .lock()
            .calls
            .get(&(table.to_string(), op))
            .copied()
            .unwrap_or(0)
    }

    pub fn session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    pub fn emit_auth(&self, kind: AuthEventKind, session: Option<Session>) {
        let _ = self.auth_tx.send(AuthEvent::new(kind, session));
    }

    pub fn emit_change(&self, table: &str, kind: ChangeKind) {
        let _ = self.change_tx.send(ChangeEvent::new(table, kind));
    }

    /// A signed-in session for `user`, without going through sign-in
    pub fn session_for(user: &AuthUser) -> Session {
        Session {
            access_token: format!("mem-{}", uuid::Uuid::new_v4()),
            refresh_token: format!("mem-refresh-{}", uuid::Uuid::new_v4()),
            expires_at: chrono::Utc::now().timestamp() + 3600,
            user: user.clone(),
        }
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_credentials(&self, email: &str, password: &str) -> BackendResult<AuthUser> {
        let state = self.state.lock();
        match state.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => Ok(account.user.clone()),
            _ => Err(
                BackendError::new(BackendErrorKind::InvalidCredentials, "Invalid login credentials")
                    .with_status(400),
            ),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => CmpOrdering::Equal,
        // nulls last
        (Some(Value::Null) | None, _) => CmpOrdering::Greater,
        (_, Some(Value::Null) | None) => CmpOrdering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn merge(row: &mut Value, patch: &Value) {
    if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let entered = self.state.lock().enter(AUTH, Op::SignIn);
        let result = entered
            .and_then(|_| self.check_credentials(email, password))
            .map(|user| {
                let session = Self::session_for(&user);
                self.state.lock().session = Some(session.clone());
                session
            });
        self.delay().await;
        let session = result?;
        self.emit_auth(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let result = {
            let mut state = self.state.lock();
            state.session = None;
            state.enter(AUTH, Op::SignOut)
        };
        self.emit_auth(AuthEventKind::SignedOut, None);
        self.delay().await;
        result
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        let result = {
            let mut state = self.state.lock();
            state.enter(AUTH, Op::GetSession).map(|_| state.session.clone())
        };
        self.delay().await;
        let session = result?;
        if !self.initial_emitted.swap(true, Ordering::SeqCst) {
            self.emit_auth(AuthEventKind::InitialSession, session.clone());
        }
        Ok(session)
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_tx.subscribe()
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn select(&self, query: &Query) -> BackendResult<Vec<Value>> {
        let result = {
            let mut state = self.state.lock();
            state.enter(&query.table, Op::Select).map(|_| {
                let mut rows: Vec<Value> = state
                    .tables
                    .get(&query.table)
                    .map(|rows| {
                        rows.iter()
                            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                if let Some(order) = &query.order {
                    rows.sort_by(|a, b| {
                        let ord = compare_values(a.get(&order.column), b.get(&order.column));
                        if order.ascending { ord } else { ord.reverse() }
                    });
                }
                if let Some(limit) = query.limit {
                    rows.truncate(limit);
                }
                rows
            })
        };
        self.delay().await;
        let rows = result?;
        if query.single && rows.len() != 1 {
            return Err(BackendError::new(
                BackendErrorKind::NotFound,
                format!("JSON object requested, {} rows returned", rows.len()),
            )
            .with_status(406));
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Value) -> BackendResult<Vec<Value>> {
        let result = {
            let mut state = self.state.lock();
            state.enter(table, Op::Insert).map(|_| {
                if let Some(obj) = row.as_object_mut()
                    && !obj.contains_key("id")
                {
                    obj.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
                }
                state
                    .tables
                    .entry(table.to_string())
                    .or_default()
                    .push(row.clone());
                vec![row]
            })
        };
        self.delay().await;
        let rows = result?;
        self.emit_change(table, ChangeKind::Insert);
        Ok(rows)
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Value,
    ) -> BackendResult<Vec<Value>> {
        let result = {
            let mut state = self.state.lock();
            state.enter(table, Op::Update).map(|_| {
                let mut updated = Vec::new();
                if let Some(rows) = state.tables.get_mut(table) {
                    for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                        merge(row, &patch);
                        updated.push(row.clone());
                    }
                }
                updated
            })
        };
        self.delay().await;
        let rows = result?;
        if !rows.is_empty() {
            self.emit_change(table, ChangeKind::Update);
        }
        Ok(rows)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> BackendResult<()> {
        let result = {
            let mut state = self.state.lock();
            state.enter(table, Op::Delete).map(|_| {
                if let Some(rows) = state.tables.get_mut(table) {
                    rows.retain(|r| !filter.matches(r));
                }
            })
        };
        self.delay().await;
        result?;
        self.emit_change(table, ChangeKind::Delete);
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_tx.subscribe()
    }
}

#[async_trait]
impl AdminBackend for MemoryBackend {
    async fn create_user(&self, attrs: &AdminUserAttributes) -> BackendResult<AuthUser> {
        let result = {
            let mut state = self.state.lock();
            state.enter(AUTH, Op::CreateUser).and_then(|_| {
                let email = attrs.email.clone().unwrap_or_default().to_lowercase();
                let password = attrs.password.clone().unwrap_or_default();
                if state.accounts.contains_key(&email) {
                    return Err(BackendError::new(
                        BackendErrorKind::AlreadyRegistered,
                        "A user with this email address has already been registered",
                    )
                    .with_status(422));
                }
                if password.chars().count() < MIN_PASSWORD_LEN {
                    return Err(BackendError::new(
                        BackendErrorKind::Validation,
                        "Password should be at least 6 characters",
                    )
                    .with_status(422));
                }
                let user = AuthUser {
                    id: uuid::Uuid::new_v4().to_string(),
                    email: Some(email.clone()),
                    user_metadata: attrs
                        .user_metadata
                        .clone()
                        .unwrap_or_else(|| Value::Object(Map::new())),
                };
                state.accounts.insert(
                    email,
                    Account {
                        user: user.clone(),
                        password,
                    },
                );
                Ok(user)
            })
        };
        self.delay().await;
        result
    }

    async fn update_user_by_id(
        &self,
        user_id: &str,
        attrs: &AdminUserAttributes,
    ) -> BackendResult<AuthUser> {
        let result = {
            let mut state = self.state.lock();
            state.enter(AUTH, Op::UpdateUser).and_then(|_| {
                let account = state
                    .accounts
                    .values_mut()
                    .find(|a| a.user.id == user_id)
                    .ok_or_else(|| BackendError::not_found("User not found").with_status(404))?;
                if let Some(password) = &attrs.password {
                    if password.chars().count() < MIN_PASSWORD_LEN {
                        return Err(BackendError::new(
                            BackendErrorKind::Validation,
                            "Password should be at least 6 characters",
                        )
                        .with_status(422));
                    }
                    account.password = password.clone();
                }
                if let Some(email) = &attrs.email {
                    account.user.email = Some(email.clone());
                }
                if let Some(metadata) = &attrs.user_metadata {
                    if !account.user.user_metadata.is_object() {
                        account.user.user_metadata = Value::Object(Map::new());
                    }
                    merge(&mut account.user.user_metadata, metadata);
                }
                Ok(account.user.clone())
            })
        };
        self.delay().await;
        result
    }

    async fn verify_password(&self, email: &str, password: &str) -> BackendResult<()> {
        let entered = self.state.lock().enter(AUTH, Op::VerifyPassword);
        let result = entered.and_then(|_| self.check_credentials(email, password).map(|_| ()));
        self.delay().await;
        result
    }
}
