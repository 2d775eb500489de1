//! Request context: backend handles and settings, passed explicitly.
//!
//! Handlers never reach for globals or module-level captures; everything they
//! need travels in this context object.

use std::sync::Arc;

use gatehouse_backend::{AllowlistStore, IdentityProvider};

/// Behavioral switches for the privileged handlers.
#[derive(Debug, Clone, Default)]
pub struct GateSettings {
    /// Require the verified principal's email to equal the claimed
    /// `admin_email`.
    ///
    /// The observed behavior is permissive: any valid credential paired with
    /// any email present in the admin table passes, so this defaults to
    /// `false`. Enabling it closes that gap and is the recommended setting
    /// for new deployments.
    pub require_principal_matches_admin_email: bool,
}

impl GateSettings {
    /// Read settings from the environment
    /// (`GATEHOUSE_REQUIRE_PRINCIPAL_MATCH=true` enables strict mode).
    pub fn from_env() -> Self {
        let strict = std::env::var("GATEHOUSE_REQUIRE_PRINCIPAL_MATCH")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        if !strict {
            tracing::warn!(
                "principal/admin_email cross-check disabled (observed permissive behavior); \
                 set GATEHOUSE_REQUIRE_PRINCIPAL_MATCH=true to enforce it"
            );
        }
        Self {
            require_principal_matches_admin_email: strict,
        }
    }
}

/// Shared context for all privileged handlers.
#[derive(Clone)]
pub struct AdminContext {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn AllowlistStore>,
    pub settings: GateSettings,
}

impl AdminContext {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn AllowlistStore>,
        settings: GateSettings,
    ) -> Self {
        Self {
            identity,
            store,
            settings,
        }
    }
}
