//! SessionController - who is logged in, and what may they see
//!
//! ```text
//!   Uninitialized ──start()──▶ Initializing ──┬─▶ Authenticated ◀─┐
//!                                             └─▶ Anonymous ──────┘
//!                     first session resolution          sign-in / sign-out
//!                     or INIT_SAFETY_TIMEOUT
//! ```
//!
//! The backend's auth events are authoritative: `login()` only reports
//! whether the credentials were accepted, the `SignedIn` event populates the
//! profile. Either may arrive first.

use parking_lot::RwLock;
use rack_client::{
    AuthBackend, AuthEvent, AuthEventKind, AuthUser, Backend, BackendErrorKind, Query, Session,
    TableBackend,
};
use shared::models::page::{LOGIN_PATH, NavItem};
use shared::models::UserRecord;
use shared::{PageId, PermissionKind, Role, UserProfile};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::mirror::{LocalMirror, MirrorKey};

/// Initialization completes after this even if the backend never answers
pub const INIT_SAFETY_TIMEOUT: Duration = Duration::from_secs(2);

/// `loading` is cleared after this if no sign-in event follows a login
pub const LOGIN_LOADING_GRACE: Duration = Duration::from_secs(3);

const NAVIGATION_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

impl AuthPhase {
    pub const fn is_initialized(&self) -> bool {
        matches!(self, AuthPhase::Authenticated | AuthPhase::Anonymous)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: AuthPhase,
    pub profile: Option<UserProfile>,
    pub loading: bool,
}

/// Request for the hosting layer to move to another route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub path: &'static str,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Grant the fallback admin profile when the `users` row cannot be
    /// resolved. Off: resolve to a guest profile with no permissions.
    pub fallback_admin_on_unresolved: bool,
    pub init_safety_timeout: Duration,
    pub login_loading_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fallback_admin_on_unresolved: true,
            init_safety_timeout: INIT_SAFETY_TIMEOUT,
            login_loading_grace: LOGIN_LOADING_GRACE,
        }
    }
}

struct SessionState {
    phase: AuthPhase,
    profile: Option<UserProfile>,
    loading: bool,
    /// Last persisted role, consulted when no profile is loaded
    stored_role: Option<Role>,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            profile: self.profile.clone(),
            loading: self.loading,
        }
    }
}

pub struct SessionController {
    backend: Arc<dyn Backend>,
    mirror: Arc<LocalMirror>,
    options: SessionOptions,
    state: RwLock<SessionState>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    nav_tx: broadcast::Sender<NavigationRequest>,
    started: AtomicBool,
    /// First-writer-wins: initial resolution vs. safety timeout
    init_done: AtomicBool,
    logout_pending: AtomicBool,
    /// Bumped by every resolution and every sign-out
    resolve_seq: AtomicU64,
    login_seq: AtomicU64,
    shutdown: CancellationToken,
}

impl SessionController {
    /// Build the controller, pre-seeding the profile from the mirror
    pub fn new(
        backend: Arc<dyn Backend>,
        mirror: Arc<LocalMirror>,
        options: SessionOptions,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let profile = mirror.load::<UserProfile>(MirrorKey::User).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable stored profile");
            None
        });
        let stored_role = mirror.load::<Role>(MirrorKey::UserRole).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable stored role");
            None
        });
        if let Some(p) = &profile {
            tracing::debug!(user_id = %p.id, "Restored profile from mirror");
        }

        let state = SessionState {
            phase: AuthPhase::Uninitialized,
            profile,
            loading: false,
            stored_role,
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        let (nav_tx, _) = broadcast::channel(NAVIGATION_CHANNEL_CAPACITY);

        Arc::new(Self {
            backend,
            mirror,
            options,
            state: RwLock::new(state),
            snapshot_tx,
            nav_tx,
            started: AtomicBool::new(false),
            init_done: AtomicBool::new(false),
            logout_pending: AtomicBool::new(false),
            resolve_seq: AtomicU64::new(0),
            login_seq: AtomicU64::new(0),
            shutdown,
        })
    }

    fn is_alive(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    // ========== Reads ==========

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_navigation(&self) -> broadcast::Receiver<NavigationRequest> {
        self.nav_tx.subscribe()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.read().phase
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.read().profile.clone()
    }

    /// Permission check.
    ///
    /// Fails open until initialization completes; a pending logout with no
    /// profile denies everything.
    pub fn has_permission(&self, page: PageId, kind: PermissionKind) -> bool {
        let state = self.state.read();
        if self.logout_pending.load(Ordering::SeqCst) && state.profile.is_none() {
            return false;
        }
        if !state.phase.is_initialized() {
            return true;
        }
        match &state.profile {
            Some(profile) => profile.allows(page, kind),
            None => state.stored_role.is_some_and(|r| r.is_admin()),
        }
    }

    /// Pages the current user may view, in menu order
    pub fn visible_navigation(&self) -> Vec<NavItem> {
        PageId::ALL
            .iter()
            .filter(|page| self.has_permission(**page, PermissionKind::View))
            .map(|page| page.nav_item())
            .collect()
    }

    // ========== Lifecycle ==========

    /// Subscribe to auth events, arm the safety timer and resolve the
    /// current session. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.update(|s| {
            s.phase = AuthPhase::Initializing;
            s.loading = true;
        });

        // Subscribe before asking for the session so no event is missed
        let events = self.backend.subscribe_auth();

        let this = self.clone();
        tokio::spawn(async move { this.listen(events).await });

        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = this.shutdown.cancelled() => {}
                _ = tokio::time::sleep(this.options.init_safety_timeout) => this.complete_init_on_timeout(),
            }
        });

        let this = self.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = this.shutdown.cancelled() => return,
                r = this.backend.get_session() => r,
            };
            match result {
                Ok(session) => this.resolve_initial(session).await,
                Err(e) => {
                    tracing::error!(kind = %e.kind, "Failed to read current session: {}", e.message);
                    this.resolve_initial(None).await;
                }
            }
        });
    }

    /// Stop listeners and timers; later continuations are no-ops
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn listen(self: Arc<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = events.recv() => match result {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Auth listener lagged {n} events, re-reading session");
                        if let Ok(session) = self.backend.get_session().await {
                            self.handle_event(AuthEvent::new(AuthEventKind::SignedIn, session)).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Auth event channel closed");
                        break;
                    }
                },
            }
        }
    }

    async fn handle_event(&self, event: AuthEvent) {
        if !self.is_alive() {
            return;
        }
        tracing::debug!(kind = ?event.kind, user_id = ?event.user_id(), "Auth event");

        match event.kind {
            AuthEventKind::InitialSession => {
                if self.init_done.load(Ordering::SeqCst) {
                    return;
                }
                self.resolve_initial(event.session).await;
            }
            AuthEventKind::SignedIn => match event.session {
                Some(session) => self.resolve_signed_in(&session.user).await,
                None => self.apply_signed_out(),
            },
            AuthEventKind::SignedOut => self.apply_signed_out(),
            AuthEventKind::TokenRefreshed => {
                let Some(session) = event.session else {
                    return;
                };
                let current = self.state.read().profile.as_ref().map(|p| p.id.clone());
                if current.as_deref() != Some(session.user.id.as_str()) {
                    self.resolve_signed_in(&session.user).await;
                }
            }
        }
    }

    fn try_complete_init(&self) -> bool {
        self.init_done
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn complete_init_on_timeout(&self) {
        if !self.is_alive() || !self.try_complete_init() {
            return;
        }
        tracing::warn!(
            timeout_ms = self.options.init_safety_timeout.as_millis() as u64,
            "Session initialization timed out, completing with stored state"
        );
        self.update(|s| {
            s.phase = if s.profile.is_some() {
                AuthPhase::Authenticated
            } else {
                AuthPhase::Anonymous
            };
            s.loading = false;
        });
    }

    /// First resolution of the backend's current session.
    ///
    /// A session arriving after the safety timeout still signs the user in;
    /// a late "no session" is ignored.
    async fn resolve_initial(&self, session: Option<Session>) {
        match session {
            Some(session) => {
                let seq = self.next_resolution();
                let profile = self.lookup_profile(&session.user).await;
                if !self.is_alive() {
                    return;
                }
                let completed = self.try_complete_init();
                if self.apply_profile(seq, profile) && completed {
                    tracing::info!(user_id = %session.user.id, "Session initialized (authenticated)");
                }
                if completed {
                    // A superseded resolution still completes initialization
                    self.update(|s| {
                        if !s.phase.is_initialized() {
                            s.phase = if s.profile.is_some() {
                                AuthPhase::Authenticated
                            } else {
                                AuthPhase::Anonymous
                            };
                        }
                        s.loading = false;
                    });
                }
            }
            None => {
                if !self.is_alive() || !self.try_complete_init() {
                    return;
                }
                tracing::info!("Session initialized (anonymous)");
                self.resolve_seq.fetch_add(1, Ordering::SeqCst);
                self.update(|s| {
                    self.clear_identity();
                    s.phase = AuthPhase::Anonymous;
                    s.profile = None;
                    s.stored_role = None;
                    s.loading = false;
                });
            }
        }
    }

    async fn resolve_signed_in(&self, user: &AuthUser) {
        let seq = self.next_resolution();
        let profile = self.lookup_profile(user).await;
        if !self.is_alive() {
            return;
        }
        // Any sign-in also counts as the end of initialization
        self.try_complete_init();
        self.apply_profile(seq, profile);
    }

    fn apply_signed_out(&self) {
        if !self.is_alive() {
            return;
        }
        self.resolve_seq.fetch_add(1, Ordering::SeqCst);
        self.try_complete_init();
        let was_signed_in = {
            let state = self.state.read();
            state.profile.is_some() || state.phase == AuthPhase::Authenticated
        };
        self.update(|s| {
            self.clear_identity();
            s.phase = AuthPhase::Anonymous;
            s.profile = None;
            s.stored_role = None;
            s.loading = false;
        });
        if was_signed_in {
            self.navigate(LOGIN_PATH);
        }
    }

    fn next_resolution(&self) -> u64 {
        self.resolve_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install a resolved profile unless a newer resolution (or a sign-out)
    /// happened meanwhile. Returns whether it was applied.
    fn apply_profile(&self, seq: u64, profile: UserProfile) -> bool {
        if !self.is_alive() {
            return false;
        }
        {
            let mut state = self.state.write();
            if self.resolve_seq.load(Ordering::SeqCst) != seq {
                tracing::debug!(seq, "Dropping superseded profile resolution");
                return false;
            }
            self.persist_profile(&profile);
            state.phase = AuthPhase::Authenticated;
            state.stored_role = Some(profile.role);
            state.profile = Some(profile);
            state.loading = false;
            self.snapshot_tx.send_replace(state.snapshot());
        }
        true
    }

    /// Look up the `users` row; unresolved lookups fall back per options
    async fn lookup_profile(&self, user: &AuthUser) -> UserProfile {
        let email = user.email.clone().unwrap_or_default();
        let query = Query::table("users").eq("id", user.id.as_str()).single();

        match self.backend.select(&query).await {
            Ok(rows) => match rows.into_iter().next().map(serde_json::from_value::<UserRecord>) {
                Some(Ok(record)) => return UserProfile::from_record(record, &email),
                Some(Err(e)) => {
                    tracing::error!(user_id = %user.id, error = %e, "Unreadable users row");
                }
                None => {
                    tracing::warn!(user_id = %user.id, "No users row for signed-in user");
                }
            },
            Err(e) if e.is(BackendErrorKind::PermissionDenied) => {
                tracing::warn!(user_id = %user.id, "Profile lookup denied: {}", e.message);
            }
            Err(e) if e.is(BackendErrorKind::NotFound) => {
                tracing::warn!(user_id = %user.id, "No users row for signed-in user");
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, kind = %e.kind, "Profile lookup failed: {}", e.message);
            }
        }

        if self.options.fallback_admin_on_unresolved {
            tracing::warn!(user_id = %user.id, "Using fallback admin profile");
            UserProfile::fallback_admin(&user.id, email)
        } else {
            UserProfile::guest(&user.id, email)
        }
    }

    // ========== Commands ==========

    /// Password sign-in. `false` for any rejection; never an error.
    pub async fn login(self: &Arc<Self>, email: &str, password: &str) -> bool {
        if email.trim().is_empty() || password.is_empty() {
            return false;
        }
        let attempt = self.login_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|s| s.loading = true);

        match self.backend.sign_in_with_password(email.trim(), password).await {
            Ok(session) => {
                crate::security_log!(INFO, "login", user_id = %session.user.id);
                let this = self.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = this.shutdown.cancelled() => {}
                        _ = tokio::time::sleep(this.options.login_loading_grace) => {
                            if this.login_seq.load(Ordering::SeqCst) == attempt && this.snapshot().loading {
                                tracing::warn!("No sign-in event after login, clearing loading flag");
                                this.update(|s| s.loading = false);
                            }
                        }
                    }
                });
                true
            }
            Err(e) => {
                if e.is(BackendErrorKind::InvalidCredentials) {
                    crate::security_log!(INFO, "login_rejected", reason = "invalid_credentials");
                } else {
                    tracing::error!(kind = %e.kind, "Login failed: {}", e.message);
                }
                if self.is_alive() {
                    self.update(|s| s.loading = false);
                }
                false
            }
        }
    }

    /// Clear local state, then ask the backend to end the session.
    ///
    /// A second call while one is pending is a no-op.
    pub async fn logout(&self) {
        if self
            .logout_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Logout already in progress");
            return;
        }

        crate::security_log!(INFO, "logout", forced = false);
        self.clear_local(true);

        if let Err(e) = self.backend.sign_out().await {
            tracing::error!(kind = %e.kind, "Backend sign-out failed: {}", e.message);
        }

        self.logout_pending.store(false, Ordering::SeqCst);
        if !self.is_alive() {
            return;
        }
        self.update(|s| s.loading = false);
        self.navigate(LOGIN_PATH);
    }

    /// Emergency logout: no pending guard, backend result only logged
    pub fn force_logout(&self) {
        crate::security_log!(WARN, "logout", forced = true);
        self.clear_local(false);

        let backend = self.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.sign_out().await {
                tracing::error!(kind = %e.kind, "Backend sign-out failed: {}", e.message);
            }
        });

        self.navigate(LOGIN_PATH);
    }

    fn clear_local(&self, loading: bool) {
        self.resolve_seq.fetch_add(1, Ordering::SeqCst);
        self.try_complete_init();
        self.update(|s| {
            self.clear_identity();
            s.phase = AuthPhase::Anonymous;
            s.profile = None;
            s.stored_role = None;
            s.loading = loading;
        });
    }

    // ========== Helpers ==========

    /// Apply a state change and publish it. No-op after shutdown.
    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        if !self.is_alive() {
            return;
        }
        let mut state = self.state.write();
        f(&mut state);
        self.snapshot_tx.send_replace(state.snapshot());
    }

    fn navigate(&self, path: &'static str) {
        let _ = self.nav_tx.send(NavigationRequest { path });
    }

    fn persist_profile(&self, profile: &UserProfile) {
        let result = self
            .mirror
            .save(MirrorKey::User, profile)
            .and_then(|_| self.mirror.save(MirrorKey::UserRole, &profile.role))
            .and_then(|_| self.mirror.write_session_marker(&profile.id));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist profile");
        }
    }

    fn clear_identity(&self) {
        if let Err(e) = self.mirror.clear_identity() {
            tracing::warn!(error = %e, "Failed to clear stored profile");
        }
    }
}
