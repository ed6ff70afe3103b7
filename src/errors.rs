use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{error, warn};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Expected failure of a business rule; its message reaches the client.
    #[error("{0}")]
    Business(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Rejected(String),
    #[error("full authentication is required to access this resource")]
    Unauthorized,
    #[error("access denied")]
    Forbidden,
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn business(message: impl Into<String>) -> Self {
        Self::Business(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<BlockingError> for AppError {
    fn from(err: BlockingError) -> Self {
        Self::Internal(anyhow::anyhow!("blocking task failed: {err}"))
    }
}

/// RFC 7807 body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl ProblemDetail {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            type_: "about:blank",
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail: detail.into(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Business(_) | AppError::Db(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let detail = match self {
            AppError::Business(message) => {
                error!("business error: {message}");
                message.clone()
            }
            AppError::Db(err) => {
                error!("database error: {err}");
                "system error".to_string()
            }
            AppError::Internal(err) => {
                error!("system error: {err:#}");
                "system error".to_string()
            }
            other => {
                warn!("request failed with {status}: {other}");
                other.to_string()
            }
        };
        HttpResponse::build(status)
            .content_type("application/problem+json")
            .json(ProblemDetail::new(status, detail))
    }
}
