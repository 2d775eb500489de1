//! In-memory backend for tests and local development.
//!
//! Implements both ports over a single mutex-guarded state, with per-surface
//! failure injection so callers can exercise their fail-open/fail-closed
//! policies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use gatehouse_auth::{AllowlistRow, GlobalConfig, Principal};
use gatehouse_core::{Email, ProviderUserId};

use crate::error::BackendError;
use crate::identity::{IdentityProvider, ProviderUser, TokenGrant};
use crate::store::AllowlistStore;

#[derive(Debug, Clone)]
struct StoredUser {
    user: ProviderUser,
    password: String,
}

#[derive(Debug, Default)]
struct Failures {
    admin_query: bool,
    allowlist_query: bool,
    config_query: bool,
    profile_cleanup: bool,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<StoredUser>,
    admins: Vec<String>,
    allowlist: HashMap<String, AllowlistRow>,
    config: Option<GlobalConfig>,
    profiles: Vec<(String, String)>,
    access_tokens: HashMap<String, ProviderUserId>,
    refresh_tokens: HashMap<String, ProviderUserId>,
    grant_expires_in: i64,
    failures: Failures,
}

/// In-memory stand-in for the hosted backend.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                grant_expires_in: 3600,
                ..State::default()
            })),
        }
    }

    /// Register a user directly (as if provisioned out-of-band).
    pub fn register_user(&self, email: &str, password: &str) -> ProviderUser {
        let user = ProviderUser {
            id: ProviderUserId::generate(),
            email: Some(email.to_string()),
            created_at: Some(chrono::Utc::now()),
        };
        self.state.lock().unwrap().users.push(StoredUser {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    /// Mint a valid access token for an already-registered user.
    pub fn issue_token(&self, email: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state
            .users
            .iter()
            .find(|u| u.user.email.as_deref() == Some(email))
            .map(|u| u.user.id.clone())
            .expect("issue_token: user not registered");
        let token = Uuid::new_v4().to_string();
        state.access_tokens.insert(token.clone(), id);
        token
    }

    pub fn add_admin(&self, email: &str) {
        self.state.lock().unwrap().admins.push(email.to_string());
    }

    /// Insert a canonical allow-list row.
    pub fn allow(&self, email: &str, approved: bool, blocked: bool) {
        self.state
            .lock()
            .unwrap()
            .allowlist
            .insert(email.to_string(), AllowlistRow::Flags { approved, blocked });
    }

    /// Insert a legacy-schema allow-list row.
    pub fn allow_legacy(&self, email: &str, enabled: bool) {
        self.state
            .lock()
            .unwrap()
            .allowlist
            .insert(email.to_string(), AllowlistRow::Enabled { enabled });
    }

    pub fn set_global_config(&self, config: Option<GlobalConfig>) {
        self.state.lock().unwrap().config = config;
    }

    pub fn add_profile(&self, id: &ProviderUserId, email: &str) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .push((id.as_str().to_string(), email.to_string()));
    }

    pub fn profile_count(&self) -> usize {
        self.state.lock().unwrap().profiles.len()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    /// Shorten (or stretch) the lifetime reported by subsequent grants.
    pub fn set_grant_expires_in(&self, seconds: i64) {
        self.state.lock().unwrap().grant_expires_in = seconds;
    }

    pub fn fail_admin_queries(&self, fail: bool) {
        self.state.lock().unwrap().failures.admin_query = fail;
    }

    pub fn fail_allowlist_queries(&self, fail: bool) {
        self.state.lock().unwrap().failures.allowlist_query = fail;
    }

    pub fn fail_config_queries(&self, fail: bool) {
        self.state.lock().unwrap().failures.config_query = fail;
    }

    pub fn fail_profile_cleanup(&self, fail: bool) {
        self.state.lock().unwrap().failures.profile_cleanup = fail;
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn resolve_token(&self, access_token: &str) -> Result<Principal, BackendError> {
        let state = self.state.lock().unwrap();
        let id = state
            .access_tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| BackendError::http(401, "invalid token"))?;
        let email = state
            .users
            .iter()
            .find(|u| u.user.id == id)
            .and_then(|u| u.user.email.as_deref())
            .and_then(Email::parse)
            .ok_or_else(|| BackendError::http(401, "invalid token"))?;
        Ok(Principal::new(id, email))
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderUser, BackendError> {
        let mut state = self.state.lock().unwrap();
        let exists = state.users.iter().any(|u| {
            u.user
                .email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        });
        if exists {
            return Err(BackendError::http(422, "User already registered"));
        }
        let user = ProviderUser {
            id: ProviderUserId::generate(),
            email: Some(email.to_string()),
            created_at: Some(chrono::Utc::now()),
        };
        state.users.push(StoredUser {
            user: user.clone(),
            password: password.to_string(),
        });
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<ProviderUser>, BackendError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().map(|u| u.user.clone()).collect())
    }

    async fn delete_user(&self, id: &ProviderUserId) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let before = state.users.len();
        state.users.retain(|u| u.user.id != *id);
        if state.users.len() == before {
            return Err(BackendError::http(404, "User not found"));
        }
        // Invalidate any outstanding tokens for the deleted identity.
        state.access_tokens.retain(|_, uid| uid != id);
        state.refresh_tokens.retain(|_, uid| uid != id);
        Ok(())
    }

    async fn update_password(
        &self,
        id: &ProviderUserId,
        new_password: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.user.id == *id)
            .ok_or_else(|| BackendError::http(404, "User not found"))?;
        user.password = new_password.to_string();
        Ok(())
    }

    async fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenGrant, BackendError> {
        let mut state = self.state.lock().unwrap();
        let (id, user) = state
            .users
            .iter()
            .find(|u| {
                u.user
                    .email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
                    && u.password == password
            })
            .map(|u| (u.user.id.clone(), u.user.clone()))
            .ok_or_else(|| BackendError::http(400, "Invalid login credentials"))?;

        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        state.access_tokens.insert(access_token.clone(), id.clone());
        state.refresh_tokens.insert(refresh_token.clone(), id);
        Ok(TokenGrant {
            access_token,
            refresh_token: Some(refresh_token),
            token_type: Some("bearer".to_string()),
            expires_in: Some(state.grant_expires_in),
            user: Some(user),
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenGrant, BackendError> {
        let mut state = self.state.lock().unwrap();
        let id = state
            .refresh_tokens
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| BackendError::http(401, "Invalid Refresh Token"))?;
        let user = state
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone())
            .ok_or_else(|| BackendError::http(401, "Invalid Refresh Token"))?;

        let access_token = Uuid::new_v4().to_string();
        state.access_tokens.insert(access_token.clone(), id);
        // Refresh token is deliberately not rotated; the caller keeps the
        // old one when none is returned.
        Ok(TokenGrant {
            access_token,
            refresh_token: None,
            token_type: Some("bearer".to_string()),
            expires_in: Some(state.grant_expires_in),
            user: Some(user),
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), BackendError> {
        self.create_user(email, password).await.map(|_| ())
    }
}

#[async_trait]
impl AllowlistStore for MemoryBackend {
    async fn is_admin(&self, email: &Email) -> Result<bool, BackendError> {
        let state = self.state.lock().unwrap();
        if state.failures.admin_query {
            return Err(BackendError::transport("injected admin_users failure"));
        }
        // Exact, case-sensitive match, like the backing table query.
        Ok(state.admins.iter().any(|a| a == email.as_str()))
    }

    async fn allowlist_entry(
        &self,
        email: &Email,
    ) -> Result<Option<AllowlistRow>, BackendError> {
        let state = self.state.lock().unwrap();
        if state.failures.allowlist_query {
            return Err(BackendError::transport("injected allowed_users failure"));
        }
        Ok(state.allowlist.get(email.as_str()).copied())
    }

    async fn global_config(&self) -> Result<Option<GlobalConfig>, BackendError> {
        let state = self.state.lock().unwrap();
        if state.failures.config_query {
            return Err(BackendError::transport("injected app_state failure"));
        }
        Ok(state.config)
    }

    async fn delete_profiles(
        &self,
        id: &ProviderUserId,
        email: &Email,
    ) -> Result<u64, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.failures.profile_cleanup {
            return Err(BackendError::transport("injected user_profiles failure"));
        }
        let before = state.profiles.len();
        state
            .profiles
            .retain(|(pid, pemail)| pid != id.as_str() && pemail != email.as_str());
        Ok((before - state.profiles.len()) as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
