//! Shared authorization step for the privileged handlers.
//!
//! All three actions run the identical protocol: extract/validate fields,
//! verify the bearer credential, check admin membership. Keeping it in one
//! function is what prevents the three handlers from drifting apart.

use serde_json::Value;

use gatehouse_auth::{Principal, PrivilegedAction, PrivilegedFields};
use gatehouse_core::{GateError, GateResult};

use crate::context::AdminContext;

/// Verify a privileged request body and return the acting principal plus the
/// validated fields.
///
/// Fail-closed throughout: a storage query error is a 500-class failure,
/// never a silent pass.
pub async fn verify_privileged_request(
    ctx: &AdminContext,
    action: PrivilegedAction,
    body: &Value,
) -> GateResult<(Principal, PrivilegedFields)> {
    let fields = PrivilegedFields::extract(action, body)?;

    // A single round trip; any rejection is terminal for this request.
    let principal = ctx
        .identity
        .resolve_token(&fields.access_token)
        .await
        .map_err(|_| GateError::InvalidCredential)?;

    let is_admin = ctx
        .store
        .is_admin(&fields.admin_email)
        .await
        .map_err(|e| GateError::backend(format!("admin_users check failed: {}", e.message())))?;
    if !is_admin {
        return Err(GateError::NotAdmin);
    }

    // The verified principal and the claimed admin_email are only tied
    // together in strict mode; under the permissive default any valid
    // credential can act for any listed admin.
    if ctx.settings.require_principal_matches_admin_email
        && principal.email != fields.admin_email
    {
        return Err(GateError::NotAdmin);
    }

    Ok((principal, fields))
}
