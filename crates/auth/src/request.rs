//! Privileged request field extraction.
//!
//! All three privileged actions share one body shape: the bearer credential
//! travels in the JSON body (some client hosts strip Authorization headers),
//! followed by the claimed admin email, the target email, and an
//! action-specific password field. Extraction trims every field and enforces
//! presence in a fixed order so the three handlers cannot drift apart.

use serde_json::Value;

use gatehouse_core::{Email, GateError, GateResult};

/// Minimum accepted password length for create/reset.
pub const MIN_PASSWORD_LEN: usize = 8;

/// The three privileged administrative operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegedAction {
    CreateUser,
    DeleteUser,
    ResetPassword,
}

impl PrivilegedAction {
    /// Name of the action-specific password field, if the action takes one.
    fn password_field(self) -> Option<&'static str> {
        match self {
            PrivilegedAction::CreateUser => Some("target_password"),
            PrivilegedAction::DeleteUser => None,
            PrivilegedAction::ResetPassword => Some("new_password"),
        }
    }
}

/// Validated, trimmed fields of a privileged request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegedFields {
    pub access_token: String,
    pub admin_email: Email,
    pub target_email: Email,
    /// Present for create (as `target_password`) and reset (as `new_password`).
    pub password: Option<String>,
}

impl PrivilegedFields {
    /// Extract and validate fields from a request body.
    ///
    /// Check order is part of the contract: credential first (401-class),
    /// then admin email, target email, and password (400-class). A malformed
    /// body should be passed in as an empty JSON object by the transport
    /// layer; every field then fails as missing rather than as a parse error.
    pub fn extract(action: PrivilegedAction, body: &Value) -> GateResult<Self> {
        let access_token = trimmed(body, "access_token");
        if access_token.is_empty() {
            return Err(GateError::MissingCredential);
        }

        let admin_email = Email::parse(&trimmed(body, "admin_email"))
            .ok_or(GateError::MissingField("admin_email"))?;

        let target_email = Email::parse(&trimmed(body, "target_email"))
            .ok_or(GateError::MissingField("target_email"))?;

        let password = match action.password_field() {
            None => None,
            Some(field) => {
                let value = trimmed(body, field);
                if value.len() < MIN_PASSWORD_LEN {
                    return Err(GateError::WeakPassword);
                }
                Some(value)
            }
        };

        Ok(Self {
            access_token,
            admin_email,
            target_email,
            password,
        })
    }
}

fn trimmed(body: &Value, field: &str) -> String {
    body.get(field)
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_body() -> Value {
        json!({
            "access_token": " tok-123 ",
            "admin_email": "a@x.com",
            "target_email": " new@x.com",
            "target_password": "longpw12",
            "new_password": "longpw12",
        })
    }

    #[test]
    fn extracts_and_trims_all_fields() {
        let fields = PrivilegedFields::extract(PrivilegedAction::CreateUser, &full_body()).unwrap();
        assert_eq!(fields.access_token, "tok-123");
        assert_eq!(fields.admin_email.as_str(), "a@x.com");
        assert_eq!(fields.target_email.as_str(), "new@x.com");
        assert_eq!(fields.password.as_deref(), Some("longpw12"));
    }

    #[test]
    fn missing_token_is_credential_error() {
        let body = json!({ "admin_email": "a@x.com", "target_email": "b@x.com" });
        let err = PrivilegedFields::extract(PrivilegedAction::DeleteUser, &body).unwrap_err();
        assert_eq!(err, GateError::MissingCredential);
    }

    #[test]
    fn whitespace_only_token_is_missing() {
        let mut body = full_body();
        body["access_token"] = json!("   ");
        let err = PrivilegedFields::extract(PrivilegedAction::DeleteUser, &body).unwrap_err();
        assert_eq!(err, GateError::MissingCredential);
    }

    #[test]
    fn missing_admin_email_reported_before_target() {
        let body = json!({ "access_token": "tok" });
        let err = PrivilegedFields::extract(PrivilegedAction::CreateUser, &body).unwrap_err();
        assert_eq!(err, GateError::MissingField("admin_email"));
    }

    #[test]
    fn short_password_is_weak() {
        let mut body = full_body();
        body["target_password"] = json!("short");
        let err = PrivilegedFields::extract(PrivilegedAction::CreateUser, &body).unwrap_err();
        assert_eq!(err, GateError::WeakPassword);
    }

    #[test]
    fn delete_ignores_password_fields() {
        let body = json!({
            "access_token": "tok",
            "admin_email": "a@x.com",
            "target_email": "b@x.com",
        });
        let fields = PrivilegedFields::extract(PrivilegedAction::DeleteUser, &body).unwrap();
        assert_eq!(fields.password, None);
    }

    #[test]
    fn reset_reads_new_password_field() {
        let body = json!({
            "access_token": "tok",
            "admin_email": "a@x.com",
            "target_email": "b@x.com",
            "new_password": "12345678",
        });
        let fields = PrivilegedFields::extract(PrivilegedAction::ResetPassword, &body).unwrap();
        assert_eq!(fields.password.as_deref(), Some("12345678"));
    }

    #[test]
    fn empty_object_fails_on_credential_first() {
        let err = PrivilegedFields::extract(PrivilegedAction::CreateUser, &json!({})).unwrap_err();
        assert_eq!(err, GateError::MissingCredential);
    }
}
