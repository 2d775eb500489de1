//! Allow-list and configuration store port.

use async_trait::async_trait;

use gatehouse_auth::{AllowlistRow, GlobalConfig};
use gatehouse_core::{Email, ProviderUserId};

use crate::error::BackendError;

/// Durable allow-list / configuration storage, at its interface boundary.
///
/// Absence of a row is a normal negative result (`Ok(false)` / `Ok(None)`),
/// never an error. `Err` means the query itself failed; how that is treated
/// (fail open vs fail closed) is the caller's policy, not this trait's.
#[async_trait]
pub trait AllowlistStore: Send + Sync {
    /// Exact, case-sensitive membership check against the admin allow-list,
    /// limited to one row.
    async fn is_admin(&self, email: &Email) -> Result<bool, BackendError>;

    /// Fetch the end-user allow-list row for an exact email match.
    async fn allowlist_entry(&self, email: &Email)
    -> Result<Option<AllowlistRow>, BackendError>;

    /// Read the single global configuration record (fixed sentinel id).
    /// Always re-queried — no local caching, so a just-flipped login switch
    /// takes effect on the next check.
    async fn global_config(&self) -> Result<Option<GlobalConfig>, BackendError>;

    /// Delete profile rows matching the user id **or** email; returns the
    /// number of rows removed. Best-effort from the caller's perspective.
    async fn delete_profiles(
        &self,
        id: &ProviderUserId,
        email: &Email,
    ) -> Result<u64, BackendError>;
}
