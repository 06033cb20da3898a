use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};

use crate::models::ServiceError;

/// Error half of every handler result: status plus the failure envelope
pub type HandlerError = (StatusCode, Json<Value>);

pub type HandlerResult<T> = Result<T, HandlerError>;

/// `{success: false, error, message, timestamp}`
pub fn error_response(status: StatusCode, message: &str) -> HandlerError {
    (
        status,
        Json(json!({
            "success": false,
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// Map the service error taxonomy onto HTTP statuses.
///
/// Storage and internal failures carry only their fixed message; the
/// underlying error stays in the server logs.
pub fn service_error_to_response(err: ServiceError) -> HandlerError {
    let status = match &err {
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::UserAlreadyExists { .. } | ServiceError::ConcurrentModification { .. } => {
            StatusCode::CONFLICT
        }
        ServiceError::ValidationError { .. }
        | ServiceError::InvalidCursor
        | ServiceError::InvalidConfirmationCode => StatusCode::BAD_REQUEST,
        ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ServiceError::AccountNotConfirmed | ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ServiceError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Internal { .. } => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    error_response(status, &err.to_string())
}

/// Malformed or missing JSON bodies get the same envelope as everything else
pub fn json_rejection(rejection: JsonRejection) -> HandlerError {
    crate::warn_with_trace!(error = %rejection, "Rejected request body");
    error_response(StatusCode::BAD_REQUEST, &rejection.body_text())
}

/// Non-numeric ids in the path, e.g. `/reviews/abc`
pub fn path_rejection(rejection: PathRejection) -> HandlerError {
    crate::warn_with_trace!(error = %rejection, "Rejected path parameters");
    error_response(rejection.status(), &rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> HandlerError {
    crate::warn_with_trace!(error = %rejection, "Rejected query string");
    error_response(StatusCode::BAD_REQUEST, &rejection.body_text())
}
