use crate::db::errors::DbError;
use crate::generation::GenerationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Server-side failure whose message is safe to show to the client
    #[error("{message}")]
    ServerError { message: String },

    /// Email generation failed before producing usable text
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Upstream error type, for generation backend failures
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Upstream error code, for generation backend failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            message: None,
            kind: None,
            code: None,
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } | Error::ServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Generation(gen_err) => match gen_err {
                GenerationError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                GenerationError::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
                GenerationError::UpstreamAuth { .. } => StatusCode::UNAUTHORIZED,
                GenerationError::Upstream { status, .. } => status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                GenerationError::CreditsExhausted => StatusCode::FORBIDDEN,
            },
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error body, without leaking internal implementation details
    pub fn body(&self) -> ErrorBody {
        match self {
            Error::Unauthenticated { message } => {
                ErrorBody::new(message.clone().unwrap_or_else(|| "Authentication required".to_string()))
            }
            Error::BadRequest { message } | Error::ServerError { message } => ErrorBody::new(message.clone()),
            Error::NotFound { resource, id } => ErrorBody::new(format!("{resource} with ID {id} not found")),
            Error::Internal { .. } | Error::Other(_) => ErrorBody::new("Internal server error"),
            Error::Generation(gen_err) => match gen_err {
                GenerationError::InvalidInput { message } => ErrorBody::new(message.clone()),
                GenerationError::ServiceUnavailable => ErrorBody::new("OpenAI API key is not configured"),
                GenerationError::UpstreamAuth { details } => ErrorBody {
                    details: Some(details.clone()),
                    ..ErrorBody::new("Invalid or expired OpenAI API key")
                },
                GenerationError::Upstream {
                    code, kind, message, ..
                } => ErrorBody {
                    kind: kind.clone(),
                    code: code.clone(),
                    ..ErrorBody::new(message.clone())
                },
                GenerationError::CreditsExhausted => ErrorBody {
                    message: Some("You have used all your credits".to_string()),
                    ..ErrorBody::new("No remaining credits")
                },
            },
            Error::Database(db_err) => ErrorBody::new(match db_err {
                DbError::NotFound => "Resource not found",
                DbError::UniqueViolation { table, constraint, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "Email already registered",
                    (Some("signup_logs"), _) => "Signup from this IP is already registered",
                    _ => "Resource already exists",
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource",
                DbError::CheckViolation { .. } => "Invalid data provided",
                DbError::Other(_) => "Database error occurred",
            }),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_))
            | Error::Internal { .. }
            | Error::ServerError { .. }
            | Error::Other(_)
            | Error::Generation(GenerationError::ServiceUnavailable) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Generation(GenerationError::UpstreamAuth { .. } | GenerationError::Upstream { .. }) => {
                tracing::warn!("Generation backend error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Generation(_) => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
