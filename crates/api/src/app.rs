//! Router and handlers for the privileged admin operations.
//!
//! One request = one decision = one mutation. Handlers are stateless; all
//! IO goes through the context's backend handles.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use gatehouse_auth::PrivilegedAction;
use gatehouse_backend::ProviderUser;
use gatehouse_core::{Email, GateError, GateResult};

use crate::authz::verify_privileged_request;
use crate::context::AdminContext;
use crate::errors::error_response;

/// Build the admin API router.
pub fn build_router(ctx: AdminContext) -> Router {
    let ctx = Arc::new(ctx);

    Router::new()
        .route("/health", get(health))
        .route(
            "/create-user",
            post(create_user).fallback(method_not_allowed),
        )
        .route(
            "/delete-user",
            post(delete_user)
                .options(delete_user_preflight)
                .fallback(delete_method_not_allowed),
        )
        .route(
            "/reset-password",
            post(reset_password).fallback(method_not_allowed),
        )
        .layer(axum::extract::Extension(ctx))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Parse a request body as JSON, treating anything malformed as an empty
/// object. Required-field validation then reports precise missing-field
/// errors instead of an opaque parse failure.
fn parse_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| json!({}))
}

/// Look up a provider user by case-insensitive email match over the single
/// listing page.
async fn find_user_by_email(ctx: &AdminContext, email: &Email) -> GateResult<ProviderUser> {
    let users = ctx
        .identity
        .list_users()
        .await
        .map_err(|e| GateError::backend(e.message()))?;
    users
        .into_iter()
        .find(|u| {
            u.email
                .as_deref()
                .is_some_and(|candidate| email.matches_ignore_case(candidate))
        })
        .ok_or(GateError::NotFound)
}

async fn method_not_allowed() -> Response {
    error_response(&GateError::MethodNotAllowed)
}

// ─────────────────────────────────────────────────────────────────────────────
// create-user
// ─────────────────────────────────────────────────────────────────────────────

async fn create_user(
    axum::extract::Extension(ctx): axum::extract::Extension<Arc<AdminContext>>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let (_principal, fields) =
        match verify_privileged_request(&ctx, PrivilegedAction::CreateUser, &body).await {
            Ok(v) => v,
            Err(e) => return error_response(&e),
        };

    // Present by construction for CreateUser.
    let password = fields.password.as_deref().unwrap_or_default();

    match ctx
        .identity
        .create_user(fields.target_email.as_str(), password)
        .await
    {
        Ok(user) => {
            tracing::info!(target_email = %fields.target_email, "admin created user");
            (StatusCode::OK, Json(json!({ "ok": true, "user": user }))).into_response()
        }
        Err(e) => error_response(&GateError::provider(e.message())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// delete-user
// ─────────────────────────────────────────────────────────────────────────────

// Some client hosts call this endpoint cross-origin, so every response
// (errors and the preflight reply included) carries permissive CORS headers.
const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Headers",
        "authorization, x-client-info, apikey, content-type",
    ),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
];

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

async fn delete_user_preflight() -> Response {
    with_cors((StatusCode::OK, "ok").into_response())
}

async fn delete_method_not_allowed() -> Response {
    with_cors(error_response(&GateError::MethodNotAllowed))
}

async fn delete_user(
    axum::extract::Extension(ctx): axum::extract::Extension<Arc<AdminContext>>,
    body: Bytes,
) -> Response {
    with_cors(delete_user_inner(&ctx, &body).await)
}

async fn delete_user_inner(ctx: &AdminContext, body: &Bytes) -> Response {
    let body = parse_body(body);
    let (_principal, fields) =
        match verify_privileged_request(ctx, PrivilegedAction::DeleteUser, &body).await {
            Ok(v) => v,
            Err(e) => return error_response(&e),
        };

    let target = match find_user_by_email(ctx, &fields.target_email).await {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    if let Err(e) = ctx.identity.delete_user(&target.id).await {
        return error_response(&GateError::provider(e.message()));
    }

    // The identity deletion above is irreversible and already committed, so
    // profile cleanup is explicitly non-transactional: a failure here is
    // reported on a 200, never rolled back.
    match ctx
        .store
        .delete_profiles(&target.id, &fields.target_email)
        .await
    {
        Ok(cleaned) => {
            tracing::info!(
                target_email = %fields.target_email,
                deleted_user_id = %target.id,
                cleaned,
                "admin deleted user"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "ok": true,
                    "deleted_user_id": target.id,
                    "cleaned": { "user_profiles": cleaned },
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(
                deleted_user_id = %target.id,
                error = %e,
                "user_profiles cleanup failed after identity deletion"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "ok": true,
                    "deleted_user_id": target.id,
                    "warn": format!("user_profiles cleanup failed: {}", e.message()),
                })),
            )
                .into_response()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// reset-password
// ─────────────────────────────────────────────────────────────────────────────

async fn reset_password(
    axum::extract::Extension(ctx): axum::extract::Extension<Arc<AdminContext>>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let (_principal, fields) =
        match verify_privileged_request(&ctx, PrivilegedAction::ResetPassword, &body).await {
            Ok(v) => v,
            Err(e) => return error_response(&e),
        };

    let target = match find_user_by_email(&ctx, &fields.target_email).await {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    // Present by construction for ResetPassword.
    let password = fields.password.as_deref().unwrap_or_default();

    match ctx.identity.update_password(&target.id, password).await {
        Ok(()) => {
            tracing::info!(target_email = %fields.target_email, "admin reset password");
            (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
        }
        Err(e) => error_response(&GateError::provider(e.message())),
    }
}
