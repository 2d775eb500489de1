//! Gate error taxonomy.
//!
//! Every failure a privileged handler can surface maps onto exactly one of
//! these variants. HTTP status mapping lives at the API boundary; this crate
//! only names the failures.

use thiserror::Error;

/// Result type used across gate decisions and privileged handlers.
pub type GateResult<T> = Result<T, GateError>;

/// Terminal failure of a gate check or privileged operation.
///
/// Display strings are part of the wire contract: the API layer serializes
/// them verbatim into `{ "error": "..." }` responses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// A required request field was absent or empty after trimming.
    #[error("Missing {0}")]
    MissingField(&'static str),

    /// `access_token` was absent or empty. Kept distinct from
    /// [`GateError::MissingField`] because it carries 401 semantics.
    #[error("Missing access_token")]
    MissingCredential,

    /// The identity provider rejected the bearer credential.
    #[error("Invalid JWT")]
    InvalidCredential,

    /// The claimed admin email is not in the admin allow-list.
    #[error("Not admin")]
    NotAdmin,

    /// The target user does not exist at the identity provider.
    #[error("User not found")]
    NotFound,

    /// The action routes accept POST only.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// A password field was present but shorter than 8 characters.
    #[error("Password must be >= 8 chars")]
    WeakPassword,

    /// The identity provider refused a mutation; the provider's own
    /// message is surfaced to the caller.
    #[error("{0}")]
    Provider(String),

    /// A storage query itself failed. Distinct from "no row found", which
    /// is a normal negative result, never an error.
    #[error("{0}")]
    BackendUnavailable(String),
}

impl GateError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }
}
