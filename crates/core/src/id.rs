//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a user by the hosted identity provider.
///
/// Opaque by design: the provider issues these and we only ever echo them
/// back (delete-by-id, password update, profile cleanup). In practice they
/// are UUID strings, but nothing here depends on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderUserId(String);

impl ProviderUserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier.
    ///
    /// Used only by in-memory test backends standing in for the provider.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProviderUserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProviderUserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<ProviderUserId> for String {
    fn from(value: ProviderUserId) -> Self {
        value.0
    }
}
