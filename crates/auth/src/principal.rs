//! Verified caller identity.

use serde::{Deserialize, Serialize};

use gatehouse_core::{Email, ProviderUserId};

/// The resolved identity of a caller.
///
/// Produced only by successful credential verification at the identity
/// provider. Immutable for the lifetime of one request/session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: ProviderUserId,
    pub email: Email,
}

impl Principal {
    pub fn new(id: ProviderUserId, email: Email) -> Self {
        Self { id, email }
    }
}
