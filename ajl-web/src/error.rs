//! API error type
//!
//! Every failure is rendered as `{"error": {"code", "message", ...}}`.
//! Access denials also carry the page the client should redirect to, and
//! validation failures carry the per-field messages.

use ajl_common::wizard::{ValidationErrors, WizardError};
use ajl_common::RouteId;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Caller has no registered identity (401)
    #[error("Identity required: {0}")]
    IdentityRequired(String),

    /// Caller may view but not change this (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Route closed for the caller's phase and group (403 + redirect)
    #[error("Access denied to {route}")]
    AccessDenied { route: RouteId, redirect: &'static str },

    /// Request conflicts with the current state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Field-scoped validation failures (422)
    #[error("Validation failed")]
    Validation(ValidationErrors),

    /// Checklist items still missing before submit (422)
    #[error("Submission incomplete")]
    Incomplete(Vec<&'static str>),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// ajl-common error
    #[error("Common error: {0}")]
    Common(#[from] ajl_common::Error),
}

impl ApiError {
    pub fn denied(route: RouteId) -> Self {
        ApiError::AccessDenied {
            route,
            redirect: route.denial_redirect(),
        }
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::Invalid(errors) => ApiError::Validation(errors),
            WizardError::Incomplete(missing) => ApiError::Incomplete(missing),
            WizardError::EvidenceNotFound(_) => ApiError::NotFound(err.to_string()),
            WizardError::PrivacyGateRequired | WizardError::AlreadySubmitted => {
                ApiError::Conflict(err.to_string())
            }
            WizardError::PrivacyChecksIncomplete | WizardError::WrongEvidenceKind(_) => {
                ApiError::BadRequest(err.to_string())
            }
            WizardError::Common(e) => ApiError::Common(e),
        }
    }
}

/// Status, code and message for a common library error
fn common_parts(err: &ajl_common::Error) -> (StatusCode, &'static str, String) {
    use ajl_common::Error as E;
    match err {
        E::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        E::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        E::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        E::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", err.to_string()),
        E::MalformedRow { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "MALFORMED_ROW", err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut extra: Option<(&str, Value)> = None;
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::IdentityRequired(msg) => (StatusCode::UNAUTHORIZED, "IDENTITY_REQUIRED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::AccessDenied { route, redirect } => {
                extra = Some(("redirect", json!(redirect)));
                (
                    StatusCode::FORBIDDEN,
                    "ACCESS_DENIED",
                    format!("The {} module is not available to you right now.", route),
                )
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Validation(errors) => {
                extra = Some(("fields", json!(errors)));
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_FAILED",
                    "Some fields need attention.".to_string(),
                )
            }
            ApiError::Incomplete(missing) => {
                let message = format!("Still missing: {}", missing.join(", "));
                extra = Some(("missing", json!(missing)));
                (StatusCode::UNPROCESSABLE_ENTITY, "INCOMPLETE", message)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => common_parts(err),
        };

        if status.is_server_error() {
            error!("{} {}: {}", status.as_u16(), error_code, message);
        }

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });
        if let Some((key, value)) = extra {
            body["error"][key] = value;
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
