//! GoTrue (auth) HTTP calls

use reqwest::{Client, Method, RequestBuilder};
use serde_json::json;

use super::{read_json, send};
use crate::config::ClientConfig;
use crate::error::BackendResult;
use crate::types::{AdminUserAttributes, AuthUser, Session, TokenResponse};

/// Thin wrapper over the `/auth/v1` endpoints
#[derive(Debug, Clone)]
pub(crate) struct AuthApi {
    http: Client,
    config: ClientConfig,
}

impl AuthApi {
    pub fn new(http: Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    fn request(&self, method: Method, path: &str, key: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.auth_url(path))
            .header("apikey", key)
            .bearer_auth(bearer)
    }

    fn anon(&self, method: Method, path: &str) -> RequestBuilder {
        let key = &self.config.anon_key;
        self.request(method, path, key, key)
    }

    pub async fn password_grant(&self, email: &str, password: &str) -> BackendResult<Session> {
        let req = self
            .anon(Method::POST, "token?grant_type=password")
            .json(&json!({ "email": email, "password": password }));
        let token: TokenResponse = read_json(send(req).await?).await?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }

    pub async fn refresh_grant(&self, refresh_token: &str) -> BackendResult<Session> {
        let req = self
            .anon(Method::POST, "token?grant_type=refresh_token")
            .json(&json!({ "refresh_token": refresh_token }));
        let token: TokenResponse = read_json(send(req).await?).await?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }

    pub async fn logout(&self, access_token: &str) -> BackendResult<()> {
        let req = self.request(
            Method::POST,
            "logout",
            &self.config.anon_key,
            access_token,
        );
        send(req).await?;
        Ok(())
    }

    pub async fn admin_create_user(
        &self,
        service_key: &str,
        attrs: &AdminUserAttributes,
    ) -> BackendResult<AuthUser> {
        let req = self
            .request(Method::POST, "admin/users", service_key, service_key)
            .json(attrs);
        read_json(send(req).await?).await
    }

    pub async fn admin_update_user(
        &self,
        service_key: &str,
        user_id: &str,
        attrs: &AdminUserAttributes,
    ) -> BackendResult<AuthUser> {
        let path = format!("admin/users/{user_id}");
        let req = self
            .request(Method::PUT, &path, service_key, service_key)
            .json(attrs);
        read_json(send(req).await?).await
    }
}
