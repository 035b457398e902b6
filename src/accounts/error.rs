use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;

/// Everything an account operation can fail with. Handlers return this
/// directly; the [`IntoResponse`] impl owns the HTTP mapping, so no call
/// site can leak an internal cause to the client.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid email format")]
    InvalidEmailFormat,
    #[error("Password must be at least 6 characters long")]
    WeakPassword,
    #[error("Email already registered")]
    Conflict,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("User not found")]
    NotFound,
    #[error("No credits remaining")]
    InsufficientCredits,
    #[error("Invalid credit amount")]
    InvalidAmount,
    #[error("Invalid plan type")]
    InvalidPlan,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AccountError::NotFound,
            StoreError::DuplicateEmail => AccountError::Conflict,
            StoreError::InsufficientCredits => AccountError::InsufficientCredits,
            StoreError::Backend(cause) => AccountError::Internal(cause),
        }
    }
}

impl AccountError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::MissingField(_)
            | AccountError::InvalidEmailFormat
            | AccountError::WeakPassword
            | AccountError::InsufficientCredits
            | AccountError::InvalidAmount
            | AccountError::InvalidPlan => StatusCode::BAD_REQUEST,
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccountError::NotFound => StatusCode::NOT_FOUND,
            AccountError::Conflict => StatusCode::CONFLICT,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AccountError::Internal(cause) => {
                // The cause stays in the logs; callers get a generic body.
                error!(error = %cause, "internal error");
                "Internal server error".to_string()
            }
            other => {
                warn!(%status, error = %other, "request rejected");
                other.to_string()
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
