//! End-user allow-list decision policy.
//!
//! Two storage schemas exist for the same capability: the canonical
//! `{approved, blocked}` pair and a legacy `{enabled}` boolean. Both are
//! normalized to [`AllowlistEntry`] before evaluation so there is exactly one
//! decision procedure.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Rows and normalization
// ─────────────────────────────────────────────────────────────────────────────

/// An allow-list row as read from storage.
///
/// `Flags` is the canonical schema; `Enabled` is the legacy schema kept for
/// tables provisioned by the earlier gating implementation.
///
/// `Enabled` is listed first: untagged deserialization tries variants in
/// order, and `Flags` defaults both fields so it would otherwise swallow a
/// legacy `{enabled}` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowlistRow {
    Enabled { enabled: bool },
    Flags {
        #[serde(default)]
        approved: bool,
        #[serde(default)]
        blocked: bool,
    },
}

/// Canonical allow-list entry used by the decision procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowlistEntry {
    pub approved: bool,
    pub blocked: bool,
}

impl AllowlistRow {
    /// Normalize either schema to the canonical flag pair.
    ///
    /// Legacy `enabled = true` means "approved, not blocked"; `enabled = false`
    /// means "not approved" (the legacy schema cannot express a block, so a
    /// disabled entry denies as not-approved rather than blocked).
    pub fn normalize(self) -> AllowlistEntry {
        match self {
            AllowlistRow::Flags { approved, blocked } => AllowlistEntry { approved, blocked },
            AllowlistRow::Enabled { enabled } => AllowlistEntry {
                approved: enabled,
                blocked: false,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// Why an end-user was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NotInWhitelist,
    Blocked,
    NotApproved,
    LoginDisabled,
}

impl DenialReason {
    /// Human-readable reason shown to the end user (the client overlay
    /// renders these verbatim).
    pub fn user_message(&self) -> &'static str {
        match self {
            DenialReason::NotInWhitelist => "不在白名单",
            DenialReason::Blocked => "已被禁用",
            DenialReason::NotApproved => "未审批",
            DenialReason::LoginDisabled => "当前已关闭登录（管理员开关）",
        }
    }
}

impl core::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.user_message())
    }
}

/// Outcome of an end-user gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

/// Evaluate the allow-list decision for a candidate's row.
///
/// Precedence order is fixed:
/// 1. no row            → denied, not in whitelist
/// 2. blocked           → denied, blocked (regardless of `approved`)
/// 3. not approved      → denied, not approved
/// 4. approved          → allowed
///
/// - No IO
/// - No panics
/// - Absence of a row is equivalent to "not approved", never an error
pub fn evaluate_allowlist(row: Option<AllowlistRow>) -> AccessDecision {
    let Some(entry) = row.map(AllowlistRow::normalize) else {
        return AccessDecision::Denied(DenialReason::NotInWhitelist);
    };

    if entry.blocked {
        return AccessDecision::Denied(DenialReason::Blocked);
    }
    if !entry.approved {
        return AccessDecision::Denied(DenialReason::NotApproved);
    }

    AccessDecision::Allowed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
