//! Persisted session material and its refresh policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_backend::{ProviderUser, TokenGrant};

/// Refresh when less than this much lifetime remains.
const REFRESH_THRESHOLD_SECS: i64 = 60;

/// Default token lifetime when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// A stored session: the tokens plus the identity they were granted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    /// Carried forward from the previous session when a refresh response
    /// omits it.
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<ProviderUser>,
}

impl Session {
    /// Build a session from a token grant.
    ///
    /// `prior` is the session being replaced, if any; its refresh token and
    /// user record fill in whatever the grant omits.
    pub fn from_grant(grant: TokenGrant, prior: Option<&Session>) -> Self {
        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Self {
            access_token: grant.access_token,
            refresh_token: grant
                .refresh_token
                .or_else(|| prior.and_then(|p| p.refresh_token.clone())),
            token_type: grant.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            user: grant.user.or_else(|| prior.and_then(|p| p.user.clone())),
        }
    }

    /// Whether the access token is expired or about to expire.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(REFRESH_THRESHOLD_SECS)
    }
}
