//! SessionController against the in-memory backend

use rack_client::memory::{AUTH, Op};
use rack_client::{AuthEventKind, BackendError, MemoryBackend};
use rack_console::mirror::{LocalMirror, MirrorKey};
use rack_console::session::{AuthPhase, SessionController, SessionOptions, SessionSnapshot};
use serde_json::json;
use shared::{PageId, PermissionKind, Role, UserProfile};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Harness {
    backend: Arc<MemoryBackend>,
    mirror: Arc<LocalMirror>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mirror = Arc::new(LocalMirror::open(dir.path()).unwrap());
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("u-1", "ana@example.com", "secret1");
        backend.seed(
            "users",
            vec![json!({
                "id": "u-1",
                "email": "ana@example.com",
                "name": "Ana",
                "role": "viewer",
                "permissions": [{"page": "racks", "view": true, "edit": false}]
            })],
        );
        Self {
            backend,
            mirror,
            _dir: dir,
        }
    }

    fn controller(&self, options: SessionOptions) -> Arc<SessionController> {
        SessionController::new(
            self.backend.clone(),
            self.mirror.clone(),
            options,
            CancellationToken::new(),
        )
    }
}

async fn wait_for(
    ctl: &SessionController,
    f: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = ctl.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out waiting for session state")
        .expect("snapshot channel closed")
        .clone()
}

#[tokio::test(start_paused = true)]
async fn test_fail_open_until_safety_timeout() {
    let h = Harness::new();
    h.backend.set_latency(Some(Duration::from_secs(10)));
    let ctl = h.controller(SessionOptions::default());
    ctl.start();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(ctl.phase(), AuthPhase::Initializing);
    assert!(ctl.has_permission(PageId::Users, PermissionKind::Edit));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Anonymous);
    assert!(!snapshot.loading);
    assert!(!ctl.has_permission(PageId::Users, PermissionKind::View));

    // The late "no session" answer changes nothing
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ctl.phase(), AuthPhase::Anonymous);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_with_stored_profile_is_authenticated() {
    let h = Harness::new();
    let stored = UserProfile::fallback_admin("u-1", "ana@example.com");
    h.mirror.save(MirrorKey::User, &stored).unwrap();
    h.backend.set_latency(Some(Duration::from_secs(10)));

    let ctl = h.controller(SessionOptions::default());
    assert_eq!(ctl.profile(), Some(stored.clone()));
    ctl.start();

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(ctl.phase(), AuthPhase::Authenticated);
    assert_eq!(ctl.profile(), Some(stored));
}

#[tokio::test]
async fn test_no_session_clears_stored_profile() {
    let h = Harness::new();
    h.mirror
        .save(MirrorKey::User, &UserProfile::fallback_admin("u-1", "ana@example.com"))
        .unwrap();
    h.mirror.save(MirrorKey::UserRole, &Role::Admin).unwrap();

    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    let snapshot = wait_for(&ctl, |s| s.phase.is_initialized()).await;

    assert_eq!(snapshot.phase, AuthPhase::Anonymous);
    assert!(snapshot.profile.is_none());
    assert!(h.mirror.load::<UserProfile>(MirrorKey::User).unwrap().is_none());
    assert!(!ctl.has_permission(PageId::Dashboard, PermissionKind::View));
}

#[tokio::test]
async fn test_existing_session_resolves_on_start() {
    let h = Harness::new();
    use rack_client::AuthBackend;
    h.backend
        .sign_in_with_password("ana@example.com", "secret1")
        .await
        .unwrap();

    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    let snapshot = wait_for(&ctl, |s| s.phase == AuthPhase::Authenticated).await;
    let profile = snapshot.profile.unwrap();
    assert_eq!(profile.name, "Ana");
    assert_eq!(profile.role, Role::Viewer);
}

#[tokio::test]
async fn test_login_wrong_then_right_credentials() {
    let h = Harness::new();
    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    wait_for(&ctl, |s| s.phase.is_initialized()).await;

    assert!(!ctl.login("ana@example.com", "wrong").await);
    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Anonymous);
    assert!(!snapshot.loading);
    assert!(!ctl.login("", "secret1").await);

    assert!(ctl.login("ana@example.com", "secret1").await);
    let snapshot = wait_for(&ctl, |s| s.phase == AuthPhase::Authenticated && !s.loading).await;
    let profile = snapshot.profile.unwrap();
    assert_eq!(profile.name, "Ana");

    // Exact page lookup for a non-admin
    assert!(ctl.has_permission(PageId::Racks, PermissionKind::View));
    assert!(!ctl.has_permission(PageId::Racks, PermissionKind::Edit));
    assert!(!ctl.has_permission(PageId::Users, PermissionKind::View));
    let pages: Vec<_> = ctl.visible_navigation().into_iter().map(|n| n.page).collect();
    assert_eq!(pages, vec![PageId::Racks]);

    // Mirrored for the next start
    let stored: UserProfile = h.mirror.load(MirrorKey::User).unwrap().unwrap();
    assert_eq!(stored, profile);
    let role: Role = h.mirror.load(MirrorKey::UserRole).unwrap().unwrap();
    assert_eq!(role, Role::Viewer);
    assert_eq!(h.mirror.session_marker().unwrap().unwrap().user_id, "u-1");
}

#[tokio::test]
async fn test_permission_denied_lookup_falls_back_to_admin() {
    let h = Harness::new();
    h.backend.fail(
        "users",
        Op::Select,
        BackendError::permission_denied("permission denied for table users"),
    );
    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    wait_for(&ctl, |s| s.phase.is_initialized()).await;

    assert!(ctl.login("ana@example.com", "secret1").await);
    let snapshot = wait_for(&ctl, |s| s.phase == AuthPhase::Authenticated).await;
    let profile = snapshot.profile.unwrap();
    assert_eq!(profile.role, Role::Admin);
    assert_eq!(profile.name, "ana");
    assert_eq!(profile.permissions.len(), PageId::ALL.len());
    assert!(ctl.has_permission(PageId::Users, PermissionKind::Edit));
}

#[tokio::test]
async fn test_unresolved_lookup_without_fallback_is_guest() {
    let h = Harness::new();
    h.backend.seed("users", Vec::new());
    let ctl = h.controller(SessionOptions {
        fallback_admin_on_unresolved: false,
        ..Default::default()
    });
    ctl.start();
    wait_for(&ctl, |s| s.phase.is_initialized()).await;

    assert!(ctl.login("ana@example.com", "secret1").await);
    let snapshot = wait_for(&ctl, |s| s.phase == AuthPhase::Authenticated).await;
    assert_eq!(snapshot.profile.unwrap().role, Role::Guest);
    assert!(ctl.visible_navigation().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_logout_is_noop() {
    let h = Harness::new();
    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    wait_for(&ctl, |s| s.phase.is_initialized()).await;
    assert!(ctl.login("ana@example.com", "secret1").await);
    wait_for(&ctl, |s| s.phase == AuthPhase::Authenticated).await;

    let mut navigation = ctl.subscribe_navigation();
    h.backend.set_latency(Some(Duration::from_secs(1)));
    tokio::join!(ctl.logout(), ctl.logout());

    assert_eq!(h.backend.calls(AUTH, Op::SignOut), 1);
    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Anonymous);
    assert!(snapshot.profile.is_none());
    assert!(h.mirror.load::<UserProfile>(MirrorKey::User).unwrap().is_none());
    assert!(h.mirror.session_marker().unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(navigation.try_recv().unwrap().path, "/login");
    assert!(navigation.try_recv().is_err());
}

#[tokio::test]
async fn test_logout_clears_state_when_backend_fails() {
    let h = Harness::new();
    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    wait_for(&ctl, |s| s.phase.is_initialized()).await;
    assert!(ctl.login("ana@example.com", "secret1").await);
    wait_for(&ctl, |s| s.phase == AuthPhase::Authenticated).await;

    h.backend.fail(AUTH, Op::SignOut, BackendError::network("offline"));
    ctl.logout().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Anonymous);
    assert!(!snapshot.loading);
}

#[tokio::test(start_paused = true)]
async fn test_stale_resolution_after_logout_is_dropped() {
    let h = Harness::new();
    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    wait_for(&ctl, |s| s.phase.is_initialized()).await;

    // Slow profile lookup, then a logout while it is in flight
    h.backend.set_latency(Some(Duration::from_secs(1)));
    let user = h.backend.add_account("u-1", "ana@example.com", "secret1");
    h.backend
        .emit_auth(AuthEventKind::SignedIn, Some(MemoryBackend::session_for(&user)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    ctl.force_logout();

    tokio::time::sleep(Duration::from_secs(3)).await;
    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Anonymous);
    assert!(snapshot.profile.is_none());
}

#[tokio::test]
async fn test_shutdown_stops_event_handling() {
    let h = Harness::new();
    let ctl = h.controller(SessionOptions::default());
    ctl.start();
    wait_for(&ctl, |s| s.phase.is_initialized()).await;

    ctl.shutdown();
    let user = h.backend.add_account("u-1", "ana@example.com", "secret1");
    h.backend
        .emit_auth(AuthEventKind::SignedIn, Some(MemoryBackend::session_for(&user)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctl.phase(), AuthPhase::Anonymous);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_profile_lookup_leaves_state_untouched() {
    let h = Harness::new();
    use rack_client::AuthBackend;
    h.backend
        .sign_in_with_password("ana@example.com", "secret1")
        .await
        .unwrap();
    h.backend.set_latency(Some(Duration::from_secs(1)));

    let ctl = h.controller(SessionOptions {
        init_safety_timeout: Duration::from_secs(30),
        ..Default::default()
    });
    ctl.start();

    // get_session finishes at 1s, the users lookup is still in flight
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let before = ctl.snapshot();
    assert_eq!(before.phase, AuthPhase::Initializing);
    assert!(before.loading);

    ctl.shutdown();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(ctl.snapshot(), before);
    assert!(h.mirror.load::<UserProfile>(MirrorKey::User).unwrap().is_none());
}
