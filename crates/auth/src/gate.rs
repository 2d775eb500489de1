//! Global login gate.

use serde::{Deserialize, Serialize};

use crate::decision::{AccessDecision, DenialReason};

/// The single global configuration record controlling login.
///
/// Stored as a nested `config` object on a fixed sentinel row; mutated
/// out-of-band by an administrator and read-only here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// `None` when the field is missing from the stored record.
    #[serde(default)]
    pub allow_login: Option<bool>,
}

/// Resolve the global login gate.
///
/// Login is permitted unless the stored record explicitly sets
/// `allow_login = false`. Absence of the record, absence of the field, and
/// (at the caller) a read error all resolve to permitted — the gate fails
/// open by contract so a missing config row can never lock everyone out.
pub fn login_permitted(config: Option<&GlobalConfig>) -> bool {
    match config {
        Some(cfg) => cfg.allow_login != Some(false),
        None => true,
    }
}

/// Compose the full end-user gate: global switch, then allow-list.
///
/// Administrators bypass both checks regardless of their allow-list state or
/// the global switch.
pub fn gate_decision(
    is_admin: bool,
    login_permitted: bool,
    whitelist: AccessDecision,
) -> AccessDecision {
    if is_admin {
        return AccessDecision::Allowed;
    }
    if !login_permitted {
        return AccessDecision::Denied(DenialReason::LoginDisabled);
    }
    whitelist
}
