//! Email value object.

use serde::{Deserialize, Serialize};

/// A trimmed, non-empty email address.
///
/// No format validation beyond non-emptiness is performed: the identity
/// provider is the authority on what constitutes a deliverable address, and
/// allow-list rows are matched against whatever the administrator stored.
///
/// Equality is **case-sensitive** — allow-list membership is an exact match.
/// Use [`Email::matches_ignore_case`] only where case folding is explicitly
/// part of the contract (provider user lookup during delete/reset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parse an email from raw input, trimming surrounding whitespace.
    ///
    /// Returns `None` when the trimmed value is empty; callers map that to
    /// their own "missing field" failure.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw string.
    pub fn matches_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
