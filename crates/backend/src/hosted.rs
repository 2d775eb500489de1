//! Hosted backend clients (REST).
//!
//! The identity surface lives under `{base}/auth/v1`, the relational store
//! under `{base}/rest/v1` with PostgREST-style filters. Privileged calls
//! authenticate with the service-role key; client-side calls use the public
//! (anon) key.

use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};

use gatehouse_auth::{AllowlistRow, GlobalConfig, Principal};
use gatehouse_core::{Email, ProviderUserId};

use crate::error::BackendError;
use crate::identity::{IdentityProvider, ProviderUser, TokenGrant};
use crate::store::AllowlistStore;

use async_trait::async_trait;

/// Page size for the single-page admin user listing.
const LIST_USERS_PER_PAGE: u32 = 1000;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct HostedConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Service-role key: full privileges, server-side only.
    pub service_key: String,
    /// Public key used for client-side auth flows.
    pub anon_key: String,
}

impl HostedConfig {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            service_key: service_key.into(),
            anon_key: anon_key.into(),
        }
    }

    /// Read settings from the environment.
    ///
    /// `GATEHOUSE_BACKEND_URL` and `GATEHOUSE_SERVICE_KEY` are required;
    /// `GATEHOUSE_ANON_KEY` is only needed by client-gate deployments.
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("GATEHOUSE_BACKEND_URL")
            .context("GATEHOUSE_BACKEND_URL must be set")?;
        let service_key = std::env::var("GATEHOUSE_SERVICE_KEY")
            .context("GATEHOUSE_SERVICE_KEY must be set")?;
        let anon_key = std::env::var("GATEHOUSE_ANON_KEY").unwrap_or_else(|_| {
            tracing::warn!("GATEHOUSE_ANON_KEY not set; client auth flows will be rejected");
            String::new()
        });
        Ok(Self::new(base_url, service_key, anon_key))
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

/// Pull the provider's own error message out of a failure response body.
///
/// The provider is inconsistent about the field name, so several are tried
/// before falling back to the raw body.
async fn provider_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if let Ok(body) = serde_json::from_str::<Value>(&text) {
        for field in ["msg", "message", "error_description", "error"] {
            if let Some(msg) = body.get(field).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
    }
    if text.is_empty() {
        format!("HTTP {status}")
    } else {
        text
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, BackendError> {
    let response = builder.send().await?;
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        Err(BackendError::http(status, provider_message(response).await))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity client
// ─────────────────────────────────────────────────────────────────────────────

/// Identity provider client over the hosted auth REST surface.
#[derive(Debug, Clone)]
pub struct HostedAuthClient {
    http: Client,
    config: HostedConfig,
}

impl HostedAuthClient {
    pub fn new(config: HostedConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn service(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    fn anon(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.config.anon_key)
    }
}

#[async_trait]
impl IdentityProvider for HostedAuthClient {
    async fn resolve_token(&self, access_token: &str) -> Result<Principal, BackendError> {
        let response = send(
            self.http
                .get(self.config.auth_url("user"))
                .header("apikey", &self.config.service_key)
                .bearer_auth(access_token),
        )
        .await?;

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| BackendError::decode(e.to_string()))?;
        let email = user
            .email
            .as_deref()
            .and_then(Email::parse)
            .ok_or_else(|| BackendError::decode("principal has no email"))?;
        Ok(Principal::new(user.id, email))
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderUser, BackendError> {
        let response = send(self.service(self.http.post(self.config.auth_url("admin/users"))).json(
            &json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }),
        ))
        .await?;

        response
            .json()
            .await
            .map_err(|e| BackendError::decode(e.to_string()))
    }

    async fn list_users(&self) -> Result<Vec<ProviderUser>, BackendError> {
        let per_page = LIST_USERS_PER_PAGE.to_string();
        let response = send(
            self.service(self.http.get(self.config.auth_url("admin/users")))
                .query(&[("page", "1"), ("per_page", per_page.as_str())]),
        )
        .await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::decode(e.to_string()))?;
        // The listing endpoint wraps the page in {"users": [...]}.
        let users = body
            .get("users")
            .cloned()
            .unwrap_or_else(|| json!([]));
        serde_json::from_value(users).map_err(|e| BackendError::decode(e.to_string()))
    }

    async fn delete_user(&self, id: &ProviderUserId) -> Result<(), BackendError> {
        let path = format!("admin/users/{id}");
        send(self.service(self.http.delete(self.config.auth_url(&path)))).await?;
        Ok(())
    }

    async fn update_password(
        &self,
        id: &ProviderUserId,
        new_password: &str,
    ) -> Result<(), BackendError> {
        let path = format!("admin/users/{id}");
        send(
            self.service(self.http.put(self.config.auth_url(&path)))
                .json(&json!({ "password": new_password })),
        )
        .await?;
        Ok(())
    }

    async fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenGrant, BackendError> {
        let response = send(
            self.anon(self.http.post(self.config.auth_url("token")))
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;

        response
            .json()
            .await
            .map_err(|e| BackendError::decode(e.to_string()))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenGrant, BackendError> {
        let response = send(
            self.anon(self.http.post(self.config.auth_url("token")))
                .query(&[("grant_type", "refresh_token")])
                .json(&json!({ "refresh_token": refresh_token })),
        )
        .await?;

        response
            .json()
            .await
            .map_err(|e| BackendError::decode(e.to_string()))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), BackendError> {
        send(
            self.anon(self.http.post(self.config.auth_url("signup")))
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store client
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed sentinel id of the global configuration row.
const GLOBAL_CONFIG_ID: &str = "global";

/// Allow-list store client over the hosted table REST surface.
///
/// Queries canonical columns (`approved`, `blocked`); deployments still on
/// the legacy `{enabled}` schema are handled by the decision layer's row
/// adapter once their rows reach it through another path (e.g. the in-memory
/// backend or a migrated view).
#[derive(Debug, Clone)]
pub struct HostedRestStore {
    http: Client,
    config: HostedConfig,
}

impl HostedRestStore {
    pub fn new(config: HostedConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn service(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn rows(&self, builder: RequestBuilder) -> Result<Vec<Value>, BackendError> {
        let response = send(builder).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::decode(e.to_string()))
    }
}

#[async_trait]
impl AllowlistStore for HostedRestStore {
    async fn is_admin(&self, email: &Email) -> Result<bool, BackendError> {
        let rows = self
            .rows(
                self.service(self.http.get(self.config.rest_url("admin_users"))).query(&[
                    ("email", format!("eq.{}", email.as_str())),
                    ("select", "email".to_string()),
                    ("limit", "1".to_string()),
                ]),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn allowlist_entry(
        &self,
        email: &Email,
    ) -> Result<Option<AllowlistRow>, BackendError> {
        let rows = self
            .rows(
                self.service(self.http.get(self.config.rest_url("allowed_users"))).query(&[
                    ("email", format!("eq.{}", email.as_str())),
                    ("select", "approved,blocked".to_string()),
                ]),
            )
            .await?;
        match rows.into_iter().next() {
            None => Ok(None),
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| BackendError::decode(e.to_string())),
        }
    }

    async fn global_config(&self) -> Result<Option<GlobalConfig>, BackendError> {
        let rows = self
            .rows(
                self.service(self.http.get(self.config.rest_url("app_state"))).query(&[
                    ("id", format!("eq.{GLOBAL_CONFIG_ID}")),
                    ("select", "data".to_string()),
                ]),
            )
            .await?;

        // Row shape: { "data": { "config": { "allow_login": bool } } }.
        // Anything missing along the way is "no explicit config".
        let Some(config) = rows
            .first()
            .and_then(|row| row.get("data"))
            .and_then(|data| data.get("config"))
            .cloned()
        else {
            return Ok(None);
        };
        serde_json::from_value(config)
            .map(Some)
            .map_err(|e| BackendError::decode(e.to_string()))
    }

    async fn delete_profiles(
        &self,
        id: &ProviderUserId,
        email: &Email,
    ) -> Result<u64, BackendError> {
        let response = send(
            self.service(self.http.delete(self.config.rest_url("user_profiles")))
                .query(&[(
                    "or",
                    format!("(id.eq.{},email.eq.{})", id.as_str(), email.as_str()),
                )])
                .header("Prefer", "count=exact"),
        )
        .await?;

        // Content-Range: "<from>-<to>/<total>"; the total is the deleted count.
        let count = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|total| total.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(count)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client-side store
// ─────────────────────────────────────────────────────────────────────────────

/// Allow-list store client for the end-user side.
///
/// Same tables as [`HostedRestStore`], but authenticated with the public
/// anon key plus, when a session exists, the user's own access token as the
/// bearer. Row-level security on the backend decides what such reads may
/// see.
#[derive(Debug)]
pub struct HostedGateStore {
    http: Client,
    config: HostedConfig,
    access_token: std::sync::RwLock<Option<String>>,
}

impl HostedGateStore {
    pub fn new(config: HostedConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            access_token: std::sync::RwLock::new(None),
        }
    }

    /// Swap in the current session's access token (`None` after sign-out).
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap() = token;
    }

    /// The user's access token when a session exists, else the anon key.
    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
    }

    async fn rows(&self, builder: RequestBuilder) -> Result<Vec<Value>, BackendError> {
        let response = send(builder).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::decode(e.to_string()))
    }
}

#[async_trait]
impl AllowlistStore for HostedGateStore {
    async fn is_admin(&self, email: &Email) -> Result<bool, BackendError> {
        let rows = self
            .rows(
                self.authed(self.http.get(self.config.rest_url("admin_users"))).query(&[
                    ("email", format!("eq.{}", email.as_str())),
                    ("select", "email".to_string()),
                    ("limit", "1".to_string()),
                ]),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn allowlist_entry(
        &self,
        email: &Email,
    ) -> Result<Option<AllowlistRow>, BackendError> {
        let rows = self
            .rows(
                self.authed(self.http.get(self.config.rest_url("allowed_users"))).query(&[
                    ("email", format!("eq.{}", email.as_str())),
                    ("select", "approved,blocked".to_string()),
                ]),
            )
            .await?;
        match rows.into_iter().next() {
            None => Ok(None),
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| BackendError::decode(e.to_string())),
        }
    }

    async fn global_config(&self) -> Result<Option<GlobalConfig>, BackendError> {
        let rows = self
            .rows(
                self.authed(self.http.get(self.config.rest_url("app_state"))).query(&[
                    ("id", format!("eq.{GLOBAL_CONFIG_ID}")),
                    ("select", "data".to_string()),
                ]),
            )
            .await?;

        let Some(config) = rows
            .first()
            .and_then(|row| row.get("data"))
            .and_then(|data| data.get("config"))
            .cloned()
        else {
            return Ok(None);
        };
        serde_json::from_value(config)
            .map(Some)
            .map_err(|e| BackendError::decode(e.to_string()))
    }

    async fn delete_profiles(
        &self,
        _id: &ProviderUserId,
        _email: &Email,
    ) -> Result<u64, BackendError> {
        // Profile cleanup is a privileged operation; the anon surface never
        // performs it.
        Err(BackendError::http(403, "not permitted with anon key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_strips_trailing_slashes() {
        let cfg = HostedConfig::new("https://x.example.co//", "srv", "anon");
        assert_eq!(cfg.base_url, "https://x.example.co");
        assert_eq!(cfg.auth_url("user"), "https://x.example.co/auth/v1/user");
        assert_eq!(
            cfg.rest_url("admin_users"),
            "https://x.example.co/rest/v1/admin_users"
        );
    }

    #[test]
    fn http_error_surfaces_provider_message() {
        let err = BackendError::http(422, "already exists");
        assert_eq!(err.message(), "already exists");
    }

    #[test]
    fn gate_store_bearer_falls_back_to_anon_key() {
        let store = HostedGateStore::new(HostedConfig::new("https://x.example.co", "srv", "anon"));
        assert_eq!(store.bearer(), "anon");

        store.set_access_token(Some("user-token".to_string()));
        assert_eq!(store.bearer(), "user-token");

        store.set_access_token(None);
        assert_eq!(store.bearer(), "anon");
    }
}
