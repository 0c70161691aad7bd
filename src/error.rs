use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::auth::cookie::clear_auth_cookie;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("{message}")]
    Rejected {
        code: u16,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error")]
    InternalError(String),

    #[error("{0}")]
    ValidationError(String),
}

/// Denial taxonomy for the session/token authentication pipeline.
///
/// The first six kinds are expected, user-facing, and final: the caller must
/// re-authenticate. `InfraFault` is a transient backend failure and the only
/// kind a caller may retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Access denied: no authentication token provided.")]
    MissingCredential,

    #[error("Access denied: the authentication token is invalid.")]
    MalformedCredential,

    #[error("Access denied: the authentication token carries no session binding.")]
    IncompleteCredential,

    #[error("Your session has expired. Please sign in again.")]
    ExpiredCredential,

    #[error("Your session has expired or is no longer valid. Please sign in again.")]
    SessionInvalid,

    #[error("Access denied: the account is not verified or does not exist.")]
    AccountNotVerified,

    #[error("Internal server error during authentication.")]
    InfraFault(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::IncompleteCredential
            | AuthError::ExpiredCredential
            | AuthError::SessionInvalid => StatusCode::UNAUTHORIZED,
            AuthError::AccountNotVerified => StatusCode::FORBIDDEN,
            AuthError::InfraFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether denial must instruct the client to drop its held token.
    ///
    /// A missing credential leaves nothing to clear, and an infra fault must
    /// not log out a holder of a possibly-valid credential.
    pub fn clears_credential(&self) -> bool {
        !matches!(
            self,
            AuthError::MissingCredential | AuthError::InfraFault(_)
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

// Every denial leaves through here, so the cookie-clear side effect is applied
// (or withheld) in exactly one place.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut builder = HttpResponse::build(status);

        if let AppError::AuthError(denial) = self {
            if denial.clears_credential() {
                builder.cookie(clear_auth_cookie());
            }
        }

        // Internal detail stays in the logs, never in the response body.
        let message = match self {
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                tracing::error!("request failed: {}", self);
                "Internal server error.".to_string()
            }
            _ => self.to_string(),
        };

        let mut body = json!({
            "status": "error",
            "code": status.as_u16(),
            "message": message,
        });
        if let AppError::Rejected { data: Some(data), .. } = self {
            body["data"] = data.clone();
        }

        builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => e.status_code(),
            AppError::Rejected { code, .. } => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Malformed reply: {0}")]
    MalformedReply(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}
