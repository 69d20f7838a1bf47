use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::services::reconcile::ReconcileError;
use crate::services::{CheckInError, StatsError};
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Already checked in: {0}")]
    AlreadyCheckedIn(String),

    #[error("Event closed: {0}")]
    EventClosed(String),

    #[error("Store error")]
    StoreError(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyCheckedIn(_) | AppError::EventClosed(_) => StatusCode::CONFLICT,
            AppError::StoreError(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyCheckedIn(_) => "ALREADY_CHECKED_IN",
            AppError::EventClosed(_) => "EVENT_CLOSED",
            AppError::StoreError(e) if e.is_transient() => "SERVICE_UNAVAILABLE",
            AppError::StoreError(_) => "DATABASE_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreError(e) if e.is_transient())
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::AlreadyCheckedIn(msg)
            | AppError::EventClosed(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::StoreError(e) => {
                error!(error = ?e, transient = e.is_transient(), "Store error");
            }
        }
    }
}

impl From<CheckInError> for AppError {
    fn from(err: CheckInError) -> Self {
        match err {
            CheckInError::NotFound(_) => AppError::NotFound(err.to_string()),
            CheckInError::AlreadyCheckedIn(_) => AppError::AlreadyCheckedIn(err.to_string()),
            CheckInError::EventClosed(_) => AppError::EventClosed(err.to_string()),
            CheckInError::Store(e) => AppError::StoreError(e),
        }
    }
}

impl From<StatsError> for AppError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::EventNotFound(_) => AppError::NotFound(err.to_string()),
            StatsError::Store(e) => AppError::StoreError(e),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Select(e) => AppError::StoreError(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let retryable = self.is_retryable();

        self.log();

        // Store failures are described generically; details stay in the logs.
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::AlreadyCheckedIn(msg)
            | AppError::EventClosed(msg) => msg.clone(),
            AppError::StoreError(_) if retryable => {
                "The ticket store is temporarily unavailable, please retry".to_string()
            }
            AppError::StoreError(_) => "A database error occurred".to_string(),
        };

        error_response(code, public_message, retryable, status)
    }
}
