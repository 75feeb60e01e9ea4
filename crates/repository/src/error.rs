//! Error types for the SIO Repository server.
//!
//! `AppError` implements `IntoResponse` so handlers can return it directly.
//! Errors raised after a session is authenticated are sealed into the session
//! envelope instead; both paths share [`AppError::status_and_message`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sio_core::{protocol::SESSION_ERROR_STATUS, CoreError};
use thiserror::Error;

use crate::domain::DomainError;

/// Everything a request can fail with, from storage up to session checks.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Organization store failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Organization store failed: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("{0}")]
    NotFound(String),

    /// Well-formed request with unacceptable field values.
    #[error("Invalid field: {0}")]
    Validation(String),

    /// Bad signature or unknown credentials.
    #[error("Unauthenticated: {0}")]
    Auth(String),

    /// Missing permission, inactive subject or role not held.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duplicate name, or a change that would break an organization rule.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Internal failure: {0}")]
    Internal(String),

    #[error("Misconfigured: {0}")]
    Config(String),

    #[error("Malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cryptographic failure: {0}")]
    Encryption(String),

    /// Unknown, expired or replayed session, or an envelope that fails to open.
    #[error("Session rejected: {0}")]
    Session(String),

    #[error("File store failed: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Serialization(_) => StatusCode::BAD_REQUEST,
            AppError::Session(_) => session_status(),
            AppError::Database(_)
            | AppError::Mongo(_)
            | AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Encryption(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status plus the message the client sees.
    ///
    /// Rule violations carry their own text (`Permission DOC_NEW is required`),
    /// everything else is prefixed by its kind. Server-side failures are
    /// logged here, since this is the last place the full error is visible.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let message = match self {
            AppError::NotFound(msg)
            | AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::Session(msg) => msg.clone(),
            other => other.to_string(),
        };
        (status, message)
    }
}

/// Status code used for session-layer failures.
pub fn session_status() -> StatusCode {
    StatusCode::from_u16(SESSION_ERROR_STATUS).unwrap_or(StatusCode::BAD_REQUEST)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_message();
        (status, Json(json!({ "error": error, "status": status.as_u16() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<envy::Error> for AppError {
    fn from(err: envy::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let msg = err.to_string();
        match err {
            DomainError::SubjectNotFound(_)
            | DomainError::RoleNotFound(_)
            | DomainError::DocumentNotFound(_) => AppError::NotFound(msg),
            DomainError::SubjectExists(_)
            | DomainError::RoleExists(_)
            | DomainError::DocumentExists(_)
            | DomainError::Invariant(_) => AppError::Conflict(msg),
            DomainError::InactiveSubject(_)
            | DomainError::PermissionDenied(_)
            | DomainError::RoleNotHeld(_) => AppError::Forbidden(msg),
            DomainError::Invalid(_) => AppError::BadRequest(msg),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BadSignature => AppError::Auth(err.to_string()),
            CoreError::InvalidKey(_) | CoreError::Encoding(_) | CoreError::UnknownValue(_) => {
                AppError::BadRequest(err.to_string())
            }
            CoreError::Json(e) => AppError::Serialization(e),
            CoreError::InvalidTag | CoreError::Encryption(_) => {
                AppError::Encryption(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sio_core::protocol::Permission;

    #[test]
    fn test_rule_messages_are_passed_through() {
        let (status, msg) =
            AppError::NotFound("Organization 'acme' not found".to_string()).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(msg, "Organization 'acme' not found");

        let (status, msg) = AppError::Validation("'email' must not be empty".to_string())
            .status_and_message();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(msg, "Invalid field: 'email' must not be empty");
    }

    #[test]
    fn test_session_error_status() {
        let (status, msg) = AppError::Session("Session expired".to_string()).status_and_message();
        assert_eq!(status.as_u16(), 499);
        assert_eq!(msg, "Session expired");
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: AppError = DomainError::PermissionDenied(Permission::DocNew).into();
        let (status, msg) = err.status_and_message();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(msg, "Permission DOC_NEW is required");

        let err: AppError = DomainError::InactiveSubject("bob".to_string()).into();
        assert_eq!(err.status_and_message().1, "User is not active");

        let err: AppError = DomainError::RoleExists("Auditors".to_string()).into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_core_error_mapping() {
        let err: AppError = CoreError::BadSignature.into();
        assert_eq!(err.status_and_message().0, StatusCode::UNAUTHORIZED);

        let err: AppError = CoreError::UnknownValue("DOC_WRITE".to_string()).into();
        assert_eq!(err.status_and_message().0, StatusCode::BAD_REQUEST);
    }
}
