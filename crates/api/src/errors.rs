//! GateError → HTTP response mapping.

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};

use gatehouse_core::GateError;

/// HTTP status for each gate failure.
pub fn status_for(err: &GateError) -> StatusCode {
    match err {
        GateError::MissingField(_) | GateError::WeakPassword | GateError::Provider(_) => {
            StatusCode::BAD_REQUEST
        }
        GateError::MissingCredential | GateError::InvalidCredential => StatusCode::UNAUTHORIZED,
        GateError::NotAdmin => StatusCode::FORBIDDEN,
        GateError::NotFound => StatusCode::NOT_FOUND,
        GateError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        GateError::BackendUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a gate failure as the wire `{error}` shape.
pub fn error_response(err: &GateError) -> Response {
    json_error(status_for(err), err.to_string())
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}
