//! RestBackend / AdminClient against an in-process stub of the hosted APIs

use axum::extract::{Path, Query as UrlQuery};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use rack_client::{
    AdminBackend, AdminUserAttributes, AuthBackend, AuthEventKind, BackendErrorKind, ClientConfig,
    Filter, Order, Query, RestBackend, AdminClient, TableBackend,
};
use serde_json::{Value, json};
use std::collections::HashMap;

const ANON: &str = "anon-key";
const SERVICE: &str = "service-key";

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim_start_matches("Bearer ")
        .to_string()
}

async fn token(
    UrlQuery(params): UrlQuery<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    assert_eq!(headers.get("apikey").unwrap(), ANON);
    match params.get("grant_type").map(String::as_str) {
        Some("password") if body["email"] == "ana@example.com" && body["password"] == "secret1" => {
            Json(json!({
                "access_token": "user-token",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "rt",
                "user": {"id": "u-1", "email": "ana@example.com", "user_metadata": {}}
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials"})),
        )
            .into_response(),
    }
}

async fn logout(headers: HeaderMap) -> StatusCode {
    assert_eq!(bearer(&headers), "user-token");
    StatusCode::NO_CONTENT
}

async fn admin_create(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    assert_eq!(headers.get("apikey").unwrap(), SERVICE);
    assert_eq!(bearer(&headers), SERVICE);
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"code": 422, "error_code": "email_exists", "msg": "A user with this email address has already been registered"})),
        )
            .into_response();
    }
    assert_eq!(body["email_confirm"], true);
    Json(json!({"id": "new-user", "email": body["email"], "user_metadata": body["user_metadata"]}))
        .into_response()
}

async fn admin_update(Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    Json(json!({"id": id, "email": "ana@example.com", "user_metadata": body.get("user_metadata").cloned().unwrap_or(json!({}))}))
        .into_response()
}

async fn table(
    Path(table): Path<String>,
    UrlQuery(params): UrlQuery<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let single = headers
        .get("accept")
        .is_some_and(|v| v == "application/vnd.pgrst.object+json");
    match table.as_str() {
        "categories" => {
            assert_eq!(params.get("order").map(String::as_str), Some("name.asc"));
            assert_eq!(params.get("select").map(String::as_str), Some("*"));
            Json(json!([{"id": "c-1", "name": "Dairy", "auth": bearer(&headers)}])).into_response()
        }
        "users" if single => (
            StatusCode::NOT_ACCEPTABLE,
            Json(json!({"code": "PGRST116", "details": "The result contains 0 rows", "message": "JSON object requested, multiple (or no) rows returned"})),
        )
            .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": "42501", "message": "permission denied for table"})),
        )
            .into_response(),
    }
}

async fn table_insert(Path(table): Path<String>, headers: HeaderMap, Json(mut row): Json<Value>) -> Response {
    assert_eq!(headers.get("prefer").unwrap(), "return=representation");
    if table == "product_codes" {
        return (
            StatusCode::CONFLICT,
            Json(json!({"code": "23505", "message": "duplicate key value violates unique constraint"})),
        )
            .into_response();
    }
    row["id"] = json!("p-9");
    (StatusCode::CREATED, Json(json!([row]))).into_response()
}

async fn table_update(
    UrlQuery(params): UrlQuery<HashMap<String, String>>,
    Json(patch): Json<Value>,
) -> Response {
    assert_eq!(params.get("id").map(String::as_str), Some("eq.r-1"));
    Json(json!([{"id": "r-1", "name": patch["name"]}])).into_response()
}

async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/auth/v1/admin/users", post(admin_create))
        .route("/auth/v1/admin/users/{id}", put(admin_update))
        .route(
            "/rest/v1/{table}",
            axum::routing::get(table).post(table_insert).patch(table_update),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_sign_in_and_table_bearer() {
    let url = spawn_stub().await;
    let backend = RestBackend::new(ClientConfig::new(&url, ANON)).unwrap();
    let mut events = backend.subscribe_auth();

    // Before sign-in the anon key is the bearer
    let rows = backend
        .select(&Query::table("categories").order(Order::asc("name")))
        .await
        .unwrap();
    assert_eq!(rows[0]["auth"], ANON);

    let err = backend
        .sign_in_with_password("ana@example.com", "nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::InvalidCredentials);
    assert_eq!(err.status, Some(400));

    let session = backend
        .sign_in_with_password("ana@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(session.user.id, "u-1");
    assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedIn);

    let rows = backend
        .select(&Query::table("categories").order(Order::asc("name")))
        .await
        .unwrap();
    assert_eq!(rows[0]["auth"], "user-token");

    let current = backend.get_session().await.unwrap();
    assert_eq!(current.map(|s| s.user.id), Some("u-1".to_string()));
    assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::InitialSession);

    backend.sign_out().await.unwrap();
    assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedOut);
    assert!(backend.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_table_error_classification() {
    let url = spawn_stub().await;
    let backend = RestBackend::new(ClientConfig::new(&url, ANON)).unwrap();

    let err = backend
        .select(&Query::table("users").eq("id", "missing").single())
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::NotFound);

    let err = backend.select(&Query::table("racks")).await.unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::PermissionDenied);

    let err = backend
        .insert("product_codes", json!({"code": "FZ-1"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::Conflict);

    let rows = backend
        .insert("products", json!({"code": "FZ-1"}))
        .await
        .unwrap();
    assert_eq!(rows[0]["id"], "p-9");

    let rows = backend
        .update("racks", &Filter::eq("id", "r-1"), json!({"name": "B-02"}))
        .await
        .unwrap();
    assert_eq!(rows[0]["name"], "B-02");
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    // Nothing listens on port 9 of localhost
    let backend = RestBackend::new(ClientConfig::new("http://127.0.0.1:9", ANON)).unwrap();
    let err = backend.select(&Query::table("racks")).await.unwrap_err();
    assert!(err.kind.is_unavailable(), "got {:?}", err.kind);
}

#[tokio::test]
async fn test_admin_client() {
    let url = spawn_stub().await;
    assert!(AdminClient::new(ClientConfig::new(&url, ANON)).is_err());

    let admin =
        AdminClient::new(ClientConfig::new(&url, ANON).with_service_role_key(SERVICE)).unwrap();

    let attrs = AdminUserAttributes {
        email: Some("bo@example.com".into()),
        password: Some("secret1".into()),
        email_confirm: Some(true),
        user_metadata: Some(json!({"name": "Bo", "role": "viewer"})),
    };
    let user = admin.create_user(&attrs).await.unwrap();
    assert_eq!(user.id, "new-user");
    assert_eq!(user.metadata_str("role"), Some("viewer"));

    let taken = AdminUserAttributes {
        email: Some("taken@example.com".into()),
        ..attrs.clone()
    };
    let err = admin.create_user(&taken).await.unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::AlreadyRegistered);

    let updated = admin
        .update_user_by_id(
            "u-1",
            &AdminUserAttributes {
                user_metadata: Some(json!({"name": "Ana B."})),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.metadata_str("name"), Some("Ana B."));

    admin
        .verify_password("ana@example.com", "secret1")
        .await
        .unwrap();
    let err = admin
        .verify_password("ana@example.com", "bad")
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::InvalidCredentials);
}
