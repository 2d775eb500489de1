//! Login gate: the state machine between "has a stored session" and
//! "allowed to load data".

use std::sync::Arc;

use chrono::Utc;

use gatehouse_auth::{
    AccessDecision, DenialReason, evaluate_allowlist, gate_decision, login_permitted,
};
use gatehouse_backend::{AllowlistStore, IdentityProvider};
use gatehouse_core::Email;

use crate::session::Session;
use crate::store::SessionStore;

/// Where the client currently stands with respect to login.
#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Booting,
    Unauthenticated,
    CheckingGates,
    /// Gates passed; `cloud_id` is the partition key for this user's data.
    Authorized { cloud_id: String },
    Denied { reason: DenialReason },
}

/// Invoked once per successful authorization with the user's partition key,
/// so the data layer starts loading exactly when access is settled.
pub type CloudLoadFn = Box<dyn Fn(&str) + Send + Sync>;

/// Drives the session through boot, login, and the access gates.
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn AllowlistStore>,
    sessions: SessionStore,
    /// Fixed administrator bypass list, compared case-insensitively.
    admin_emails: Vec<Email>,
    state: GateState,
    on_cloud_load: Option<CloudLoadFn>,
}

impl SessionGate {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn AllowlistStore>,
        sessions: SessionStore,
        admin_emails: Vec<Email>,
    ) -> Self {
        Self {
            identity,
            store,
            sessions,
            admin_emails,
            state: GateState::Booting,
            on_cloud_load: None,
        }
    }

    pub fn set_on_cloud_load(&mut self, callback: CloudLoadFn) {
        self.on_cloud_load = Some(callback);
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Resume from a stored session, refreshing it if it is about to expire.
    pub async fn boot(&mut self) -> anyhow::Result<GateState> {
        self.state = GateState::Booting;

        let Some(session) = self.sessions.load_session().await? else {
            self.state = GateState::Unauthenticated;
            return Ok(self.state.clone());
        };

        let session = if session.needs_refresh(Utc::now()) {
            match self.refresh(&session).await {
                Some(refreshed) => refreshed,
                None => {
                    self.sessions.clear_session().await?;
                    self.state = GateState::Unauthenticated;
                    return Ok(self.state.clone());
                }
            }
        } else {
            session
        };

        self.finish_gates(session).await
    }

    async fn refresh(&self, session: &Session) -> Option<Session> {
        let refresh_token = session.refresh_token.as_deref()?;
        match self.identity.refresh_session(refresh_token).await {
            Ok(grant) => {
                let refreshed = Session::from_grant(grant, Some(session));
                if let Err(err) = self.sessions.save_session(&refreshed).await {
                    tracing::warn!(error = %err, "failed to persist refreshed session");
                }
                Some(refreshed)
            }
            Err(err) => {
                tracing::warn!(error = %err, "session refresh rejected");
                None
            }
        }
    }

    /// Exchange credentials for a session, then run the access gates.
    pub async fn login(&mut self, email: &str, password: &str) -> anyhow::Result<GateState> {
        let grant = match self.identity.password_grant(email, password).await {
            Ok(grant) => grant,
            Err(err) => {
                self.state = GateState::Unauthenticated;
                return Err(anyhow::anyhow!(err.message()));
            }
        };

        let session = Session::from_grant(grant, None);
        self.sessions.save_session(&session).await?;
        self.finish_gates(session).await
    }

    /// Self-service signup. Grants nothing; the allow-list still gates the
    /// subsequent login.
    pub async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<()> {
        self.identity
            .sign_up(email, password)
            .await
            .map_err(|e| anyhow::anyhow!(e.message()))
    }

    pub async fn sign_out(&mut self) -> anyhow::Result<GateState> {
        self.sessions.clear_session().await?;
        self.state = GateState::Unauthenticated;
        Ok(self.state.clone())
    }

    async fn finish_gates(&mut self, session: Session) -> anyhow::Result<GateState> {
        self.state = GateState::CheckingGates;

        let Some((cloud_id, email)) = self.identify(&session).await else {
            self.sessions.clear_session().await?;
            self.state = GateState::Unauthenticated;
            return Ok(self.state.clone());
        };

        match self.evaluate(&email).await {
            AccessDecision::Allowed => {
                self.state = GateState::Authorized {
                    cloud_id: cloud_id.clone(),
                };
                if let Some(callback) = &self.on_cloud_load {
                    callback(&cloud_id);
                }
            }
            AccessDecision::Denied(reason) => {
                // A denied user keeps no credentials around.
                self.sessions.clear_session().await?;
                tracing::info!(denial = ?reason, "login gate denied access");
                self.state = GateState::Denied { reason };
            }
        }
        Ok(self.state.clone())
    }

    /// Resolve the session to a partition key and an email, falling back to
    /// the provider when the stored record lacks the user.
    async fn identify(&self, session: &Session) -> Option<(String, Email)> {
        if let Some(user) = &session.user {
            if let Some(email) = user.email.as_deref().and_then(Email::parse) {
                return Some((user.id.to_string(), email));
            }
        }
        match self.identity.resolve_token(&session.access_token).await {
            Ok(principal) => Some((principal.id.to_string(), principal.email)),
            Err(err) => {
                tracing::warn!(error = %err, "stored access token rejected");
                None
            }
        }
    }

    /// Run the global switch and the allow-list.
    ///
    /// Reads fail open here: losing connectivity to the config tables must
    /// not lock out an already provisioned user. The privileged server
    /// surface makes the opposite choice.
    async fn evaluate(&self, email: &Email) -> AccessDecision {
        let is_admin = self
            .admin_emails
            .iter()
            .any(|admin| admin.matches_ignore_case(email.as_str()));

        let config = match self.store.global_config().await {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "global config read failed; allowing login");
                None
            }
        };

        let whitelist = match self.store.allowlist_entry(email).await {
            Ok(row) => evaluate_allowlist(row),
            Err(err) => {
                tracing::warn!(error = %err, "allow-list read failed; allowing login");
                AccessDecision::Allowed
            }
        };

        gate_decision(is_admin, login_permitted(config.as_ref()), whitelist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use gatehouse_auth::GlobalConfig;
    use gatehouse_backend::{IdentityProvider, MemoryBackend};
    use uuid::Uuid;

    fn temp_sessions() -> SessionStore {
        let path = std::env::temp_dir().join(format!("gatehouse-gate-test-{}.db", Uuid::new_v4()));
        SessionStore::new(path)
    }

    fn gate_over(backend: &MemoryBackend, admin_emails: Vec<Email>) -> SessionGate {
        SessionGate::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            temp_sessions(),
            admin_emails,
        )
    }

    fn admin_list(emails: &[&str]) -> Vec<Email> {
        emails.iter().map(|e| Email::parse(e).unwrap()).collect()
    }

    #[tokio::test]
    async fn boot_without_session_is_unauthenticated() {
        let backend = MemoryBackend::new();
        let mut gate = gate_over(&backend, vec![]);
        assert_eq!(gate.boot().await.unwrap(), GateState::Unauthenticated);
    }

    #[tokio::test]
    async fn login_of_approved_user_authorizes_and_loads_data() {
        let backend = MemoryBackend::new();
        let user = backend.register_user("user@example.com", "password-1");
        backend.allow("user@example.com", true, false);

        let mut gate = gate_over(&backend, vec![]);
        let loads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&loads);
        gate.set_on_cloud_load(Box::new(move |cloud_id| {
            seen.lock().unwrap().push(cloud_id.to_string());
        }));

        let state = gate.login("user@example.com", "password-1").await.unwrap();
        assert_eq!(
            state,
            GateState::Authorized {
                cloud_id: user.id.to_string()
            }
        );
        assert_eq!(*loads.lock().unwrap(), vec![user.id.to_string()]);

        // The session survived the gates.
        assert!(gate.sessions.load_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn login_with_bad_credentials_is_an_error() {
        let backend = MemoryBackend::new();
        backend.register_user("user@example.com", "password-1");

        let mut gate = gate_over(&backend, vec![]);
        let err = gate
            .login("user@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(gate.state(), &GateState::Unauthenticated);
    }

    #[tokio::test]
    async fn unlisted_user_is_denied() {
        let backend = MemoryBackend::new();
        backend.register_user("user@example.com", "password-1");

        let mut gate = gate_over(&backend, vec![]);
        let state = gate.login("user@example.com", "password-1").await.unwrap();
        assert_eq!(
            state,
            GateState::Denied {
                reason: DenialReason::NotInWhitelist
            }
        );
        assert_eq!(DenialReason::NotInWhitelist.user_message(), "不在白名单");
    }

    #[tokio::test]
    async fn blocked_stored_session_is_denied_and_cleared() {
        let backend = MemoryBackend::new();
        backend.register_user("user@example.com", "password-1");
        backend.allow("user@example.com", true, false);

        let mut gate = gate_over(&backend, vec![]);
        gate.login("user@example.com", "password-1").await.unwrap();

        // Blocked between sessions.
        backend.allow("user@example.com", true, true);

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        gate.set_on_cloud_load(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let state = gate.boot().await.unwrap();
        assert_eq!(
            state,
            GateState::Denied {
                reason: DenialReason::Blocked
            }
        );
        assert_eq!(DenialReason::Blocked.user_message(), "已被禁用");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(gate.sessions.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn kill_switch_denies_non_admin() {
        let backend = MemoryBackend::new();
        backend.register_user("user@example.com", "password-1");
        backend.allow("user@example.com", true, false);
        backend.set_global_config(Some(GlobalConfig {
            allow_login: Some(false),
        }));

        let mut gate = gate_over(&backend, vec![]);
        let state = gate.login("user@example.com", "password-1").await.unwrap();
        assert_eq!(
            state,
            GateState::Denied {
                reason: DenialReason::LoginDisabled
            }
        );
        assert_eq!(
            DenialReason::LoginDisabled.user_message(),
            "当前已关闭登录（管理员开关）"
        );
    }

    #[tokio::test]
    async fn admin_bypasses_kill_switch_and_allowlist() {
        let backend = MemoryBackend::new();
        let admin = backend.register_user("boss@example.com", "password-1");
        backend.set_global_config(Some(GlobalConfig {
            allow_login: Some(false),
        }));
        // Not on the allow-list at all, and case differs from the bypass
        // entry.
        let mut gate = gate_over(&backend, admin_list(&["Boss@Example.com"]));
        let state = gate.login("boss@example.com", "password-1").await.unwrap();
        assert_eq!(
            state,
            GateState::Authorized {
                cloud_id: admin.id.to_string()
            }
        );
    }

    #[tokio::test]
    async fn gate_reads_fail_open() {
        let backend = MemoryBackend::new();
        let user = backend.register_user("user@example.com", "password-1");
        backend.fail_config_queries(true);
        backend.fail_allowlist_queries(true);

        let mut gate = gate_over(&backend, vec![]);
        let state = gate.login("user@example.com", "password-1").await.unwrap();
        assert_eq!(
            state,
            GateState::Authorized {
                cloud_id: user.id.to_string()
            }
        );
    }

    #[tokio::test]
    async fn legacy_enabled_row_still_gates() {
        let backend = MemoryBackend::new();
        backend.register_user("old@example.com", "password-1");
        backend.allow_legacy("old@example.com", false);

        let mut gate = gate_over(&backend, vec![]);
        let state = gate.login("old@example.com", "password-1").await.unwrap();
        assert_eq!(
            state,
            GateState::Denied {
                reason: DenialReason::NotApproved
            }
        );
        assert_eq!(DenialReason::NotApproved.user_message(), "未审批");
    }

    #[tokio::test]
    async fn boot_refreshes_an_expiring_session() {
        let backend = MemoryBackend::new();
        backend.register_user("user@example.com", "password-1");
        backend.allow("user@example.com", true, false);
        // Grants come back already inside the refresh window.
        backend.set_grant_expires_in(30);

        let mut gate = gate_over(&backend, vec![]);
        gate.login("user@example.com", "password-1").await.unwrap();
        let first = gate.sessions.load_session().await.unwrap().unwrap();

        let state = gate.boot().await.unwrap();
        assert!(matches!(state, GateState::Authorized { .. }));

        let second = gate.sessions.load_session().await.unwrap().unwrap();
        assert_ne!(first.access_token, second.access_token);
        // Refresh token was not rotated, so it carried over.
        assert_eq!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn boot_with_revoked_refresh_token_signs_out() {
        let backend = MemoryBackend::new();
        let user = backend.register_user("user@example.com", "password-1");
        backend.allow("user@example.com", true, false);
        backend.set_grant_expires_in(30);

        let mut gate = gate_over(&backend, vec![]);
        gate.login("user@example.com", "password-1").await.unwrap();

        // Deleting the identity revokes every outstanding token.
        backend.delete_user(&user.id).await.unwrap();

        let state = gate.boot().await.unwrap();
        assert_eq!(state, GateState::Unauthenticated);
        assert!(gate.sessions.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_the_session() {
        let backend = MemoryBackend::new();
        backend.register_user("user@example.com", "password-1");
        backend.allow("user@example.com", true, false);

        let mut gate = gate_over(&backend, vec![]);
        gate.login("user@example.com", "password-1").await.unwrap();
        assert_eq!(gate.sign_out().await.unwrap(), GateState::Unauthenticated);
        assert!(gate.sessions.load_session().await.unwrap().is_none());
        assert_eq!(gate.boot().await.unwrap(), GateState::Unauthenticated);
    }
}
