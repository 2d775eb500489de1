//! Identity provider port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_auth::Principal;
use gatehouse_core::ProviderUserId;

use crate::error::BackendError;

/// A user record as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: ProviderUserId,
    /// Absent for identities provisioned without an email.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Token material returned by a password grant or a session refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Providers may omit this on refresh; callers keep the old one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds; callers default to 3600 when absent.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<ProviderUser>,
}

/// The hosted identity provider, at its interface boundary.
///
/// Every method is a single synchronous-from-the-caller's-perspective round
/// trip. No retries: a failure is terminal for the calling operation.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an opaque bearer credential to a principal, or reject it.
    async fn resolve_token(&self, access_token: &str) -> Result<Principal, BackendError>;

    /// Create a user with the email pre-confirmed (admin capability).
    async fn create_user(&self, email: &str, password: &str)
    -> Result<ProviderUser, BackendError>;

    /// List users — one effectively-unbounded page (admin capability).
    async fn list_users(&self) -> Result<Vec<ProviderUser>, BackendError>;

    /// Delete a user by provider id (admin capability).
    async fn delete_user(&self, id: &ProviderUserId) -> Result<(), BackendError>;

    /// Replace a user's password (admin capability).
    async fn update_password(
        &self,
        id: &ProviderUserId,
        new_password: &str,
    ) -> Result<(), BackendError>;

    /// Direct email+password credential exchange.
    async fn password_grant(&self, email: &str, password: &str)
    -> Result<TokenGrant, BackendError>;

    /// Exchange a refresh token for fresh session tokens.
    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenGrant, BackendError>;

    /// Self-service signup. Does not grant access; the whitelist still
    /// gates login afterwards.
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), BackendError>;
}
