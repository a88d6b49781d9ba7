//! Admin endpoints against the in-memory backend

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rack_admin::{AppState, app, cors_layer};
use rack_client::memory::{AUTH, Op};
use rack_client::{BackendError, MemoryBackend};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_account("u-1", "ana@example.com", "secret1");
    backend.seed(
        "users",
        vec![json!({"id": "u-1", "email": "ana@example.com", "name": "Ana", "role": "admin"})],
    );
    backend
}

fn router(backend: &Arc<MemoryBackend>) -> axum::Router {
    app(AppState::new(backend.clone()), cors_layer(None).unwrap())
}

async fn post(router: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let backend = backend();
    let response = router(&backend)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "rack-admin");
}

#[tokio::test]
async fn test_create_user_writes_auth_user_and_row() {
    let backend = backend();
    let (status, body) = post(
        router(&backend),
        "/api/admin/create-user",
        json!({"email": " Bo@Example.com ", "password": "hunter22", "name": "Bo", "role": "manager"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "bo@example.com");
    assert_eq!(body["user"]["role"], "manager");

    let id = body["user"]["id"].as_str().unwrap();
    let rows = backend.rows("users");
    let row = rows.iter().find(|r| r["id"] == id).unwrap();
    assert_eq!(row["name"], "Bo");
    assert_eq!(row["role"], "manager");

    let (status, _) = post(
        router(&backend),
        "/api/auth/verify-password",
        json!({"email": "bo@example.com", "password": "hunter22"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_user_duplicate_is_conflict() {
    let backend = backend();
    let (status, body) = post(
        router(&backend),
        "/api/admin/create-user",
        json!({"email": "ana@example.com", "password": "secret1", "name": "Ana", "role": "viewer"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already been registered"));
}

#[tokio::test]
async fn test_create_user_validates_before_backend() {
    let backend = backend();
    let cases = [
        json!({"password": "secret1", "name": "Bo", "role": "viewer"}),
        json!({"email": "not-an-email", "password": "secret1", "name": "Bo", "role": "viewer"}),
        json!({"email": "bo@example.com", "password": "123", "name": "Bo", "role": "viewer"}),
        json!({"email": "bo@example.com", "password": "secret1", "name": "  ", "role": "viewer"}),
        json!({"email": "bo@example.com", "password": "secret1", "name": "Bo", "role": "owner"}),
    ];
    for case in cases {
        let (status, body) = post(router(&backend), "/api/admin/create-user", case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        assert!(body["error"].is_string());
    }
    assert_eq!(backend.calls(AUTH, Op::CreateUser), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let backend = backend();
    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/update-password")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router(&backend).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_row_failure_still_reports_success() {
    let backend = backend();
    backend.fail("users", Op::Insert, BackendError::permission_denied("rls"));
    let (status, body) = post(
        router(&backend),
        "/api/admin/create-user",
        json!({"email": "cy@example.com", "password": "secret1", "name": "Cy", "role": "viewer"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(backend.rows("users").len(), 1);
}

#[tokio::test]
async fn test_update_password() {
    let backend = backend();
    let (status, body) = post(
        router(&backend),
        "/api/admin/update-password",
        json!({"userId": "u-1", "newPassword": "newsecret"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, _) = post(
        router(&backend),
        "/api/auth/verify-password",
        json!({"email": "ana@example.com", "password": "secret1"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(
        router(&backend),
        "/api/admin/update-password",
        json!({"userId": "u-1", "newPassword": "x"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_user_name() {
    let backend = backend();
    let (status, body) = post(
        router(&backend),
        "/api/admin/update-user-name",
        json!({"userId": "u-1", "name": " Ana Maria "}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(backend.rows("users")[0]["name"], "Ana Maria");

    let (status, _) = post(
        router(&backend),
        "/api/admin/update-user-name",
        json!({"userId": "missing", "name": "Nobody"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_password() {
    let backend = backend();
    let (status, body) = post(
        router(&backend),
        "/api/auth/verify-password",
        json!({"email": "ana@example.com", "password": "secret1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = post(
        router(&backend),
        "/api/auth/verify-password",
        json!({"email": "ana@example.com", "password": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_missing_admin_key_is_server_error() {
    let router = app(AppState::without_admin(), cors_layer(None).unwrap());
    let (status, body) = post(
        router,
        "/api/auth/verify-password",
        json!({"email": "ana@example.com", "password": "secret1"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_create_user_stores_permissions() {
    let backend = backend();
    let permissions = json!([
        {"page": "racks", "view": true, "edit": true},
        {"page": "products", "view": true, "edit": false},
        {"page": "reports", "view": true, "edit": false}
    ]);
    let (status, body) = post(
        router(&backend),
        "/api/admin/create-user",
        json!({"email": "di@example.com", "password": "secret1", "name": "Di", "role": "viewer", "permissions": permissions}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let expected = json!([
        {"page": "racks", "view": true, "edit": true},
        {"page": "products", "view": true, "edit": false}
    ]);
    assert_eq!(body["user"]["permissions"], expected);

    let rows = backend.rows("users");
    let row = rows.iter().find(|r| r["email"] == "di@example.com").unwrap();
    assert_eq!(row["permissions"], expected);
}

#[tokio::test]
async fn test_create_user_without_permissions_stores_empty_list() {
    let backend = backend();
    let (status, body) = post(
        router(&backend),
        "/api/admin/create-user",
        json!({"email": "ed@example.com", "password": "secret1", "name": "Ed", "role": "viewer"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["permissions"], json!([]));
    let rows = backend.rows("users");
    let row = rows.iter().find(|r| r["email"] == "ed@example.com").unwrap();
    assert_eq!(row["permissions"], json!([]));
}
