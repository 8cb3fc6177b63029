use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{repository::RepositoryError, token::TokenError, workflow::WorkflowError};

/// AppError
///
/// The API-facing error taxonomy. Every JSON endpoint returns `Result<_, AppError>`; the
/// gateway's page-navigation path never produces one (it redirects instead).
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, malformed, tampered or expired credential.
    #[error("{0}")]
    Authentication(String),

    /// Valid credential without the required role or verification.
    #[error("{0}")]
    Authorization(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("{0}")]
    Conflict(String),

    /// Store or notification backend unavailable. Safe to retry.
    #[error("{0}")]
    Dependency(String),
}

/// ErrorBody
///
/// Wire shape of every API error. `error` is stable and safe to branch on.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl AppError {
    pub fn unauthorized() -> Self {
        AppError::Authentication("authentication required".to_string())
    }

    pub fn forbidden() -> Self {
        AppError::Authorization("insufficient privileges".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::IllegalTransition { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "unauthorized",
            AppError::Authorization(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::IllegalTransition { .. } => "illegal_transition",
            AppError::Conflict(_) => "conflict",
            AppError::Dependency(_) => "dependency_failure",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed on a dependency");
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
            retryable: matches!(self, AppError::Dependency(_)),
        };
        (status, Json(body)).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Issue(msg) => AppError::Dependency(msg),
            other => AppError::Authentication(other.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Dependency(other.to_string()),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::NotFound(entity) => AppError::NotFound(entity.to_string()),
            WorkflowError::InvalidStatus(_)
            | WorkflowError::InvalidAction(_)
            | WorkflowError::NotApprovable(_)
            | WorkflowError::NotBlockable(_) => AppError::InvalidInput(e.to_string()),
            WorkflowError::IllegalTransition { from, to } => AppError::IllegalTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            WorkflowError::Contended(_) => AppError::Conflict(e.to_string()),
            WorkflowError::Store(inner) => inner.into(),
        }
    }
}

/// Malformed or mistyped JSON bodies become a 400 with the usual error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}
