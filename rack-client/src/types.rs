//! Backend-owned types: sessions, auth users and event payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Auth identity as issued by the auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata; the admin API stores `name` and `role` here
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(Value::as_str)
    }
}

/// Session owned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: i64,
    pub user: AuthUser,
}

impl Session {
    /// Expired, or within `leeway_secs` of expiring
    pub fn is_expired(&self, now_secs: i64, leeway_secs: i64) -> bool {
        self.expires_at > 0 && self.expires_at - leeway_secs <= now_secs
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    pub fn into_session(self, now_secs: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now_secs + secs))
            .unwrap_or_default();
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

/// Row change notification from the realtime feed
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            table: table.into(),
            kind,
        }
    }
}

/// Attributes accepted by the admin user API
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminUserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_response_expiry() {
        let resp: TokenResponse = serde_json::from_value(json!({
            "access_token": "at",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "rt",
            "user": {"id": "u-1", "email": "a@b.co", "user_metadata": {"name": "Ana"}}
        }))
        .unwrap();
        let session = resp.into_session(1_000);
        assert_eq!(session.expires_at, 4_600);
        assert_eq!(session.user.metadata_str("name"), Some("Ana"));
        assert!(!session.is_expired(1_000, 60));
        assert!(session.is_expired(4_580, 60));
    }

    #[test]
    fn test_admin_attributes_skip_unset() {
        let attrs = AdminUserAttributes {
            password: Some("secret1".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&attrs).unwrap(), json!({"password": "secret1"}));
    }

    #[test]
    fn test_change_kind_decode() {
        let kind: ChangeKind = serde_json::from_str("\"INSERT\"").unwrap();
        assert_eq!(kind, ChangeKind::Insert);
        let kind: ChangeKind = serde_json::from_str("\"TRUNCATE\"").unwrap();
        assert_eq!(kind, ChangeKind::Unknown);
    }
}
