use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use time::Date;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    services::{assignment::AssignmentError, ledger::LedgerError},
    state::lifecycle::InvalidTransition,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Another writer committed first; nothing was applied.
    #[error("concurrent update: {0}")]
    WriteConflict(String),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The caller does not own the resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// Available funds do not cover the price.
    #[error("insufficient funds: {required} required, {available} available (short by {})", .required - .available)]
    InsufficientFunds { required: u64, available: u64 },
    /// Available points do not cover the price.
    #[error("insufficient points: {required} required, {available} available (short by {})", .required - .available)]
    InsufficientPoints { required: u64, available: u64 },
    /// The user does not fit the classification fixed on the slot.
    #[error("classification mismatch: {0}")]
    ClassificationMismatch(String),
    /// The user already holds a confirmed booking on that day.
    #[error("already booked on {0}")]
    AlreadyBookedToday(Date),
    /// The user already has an active booking on the slot.
    #[error("already joined slot")]
    AlreadyJoined,
    /// Another option won the race first.
    #[error("slot already confirmed")]
    SlotAlreadyConfirmed,
    /// Recycled spots can only be paid with points.
    #[error("recycled spots can only be booked with points")]
    RecycledSpotRequiresPoints,
    /// No court (or the instructor) is free for the interval.
    #[error("no resource available: {0}")]
    NoResourceAvailable(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { message } => ServiceError::WriteConflict(message),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Balance does not cover the price.
    #[error("payment required: {0}")]
    PaymentRequired(String),
    /// Caller is not allowed to act on the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state; `code` lets clients tell business rules apart.
    #[error("conflict: {message}")]
    Conflict { code: &'static str, message: String },
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn conflict(code: &'static str, err: &ServiceError) -> Self {
        AppError::Conflict {
            code,
            message: err.to_string(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::PaymentRequired(_) => "payment_required",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict { code, .. } => code,
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::Unauthorized(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::InsufficientFunds { .. } | ServiceError::InsufficientPoints { .. } => {
                AppError::PaymentRequired(err.to_string())
            }
            ServiceError::WriteConflict(_) => AppError::conflict("write_conflict", &err),
            ServiceError::InvalidState(_) => AppError::conflict("invalid_state", &err),
            ServiceError::ClassificationMismatch(_) => {
                AppError::conflict("classification_mismatch", &err)
            }
            ServiceError::AlreadyBookedToday(_) => AppError::conflict("already_booked_today", &err),
            ServiceError::AlreadyJoined => AppError::conflict("already_joined", &err),
            ServiceError::SlotAlreadyConfirmed => {
                AppError::conflict("slot_already_confirmed", &err)
            }
            ServiceError::RecycledSpotRequiresPoints => {
                AppError::conflict("recycled_spot_requires_points", &err)
            }
            ServiceError::NoResourceAvailable(_) => {
                AppError::conflict("no_resource_available", &err)
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => ServiceError::InsufficientFunds {
                required,
                available,
            },
            LedgerError::InsufficientPoints {
                required,
                available,
            } => ServiceError::InsufficientPoints {
                required,
                available,
            },
            LedgerError::UnknownUser(user_id) => {
                ServiceError::NotFound(format!("user `{user_id}` not found"))
            }
            LedgerError::UnknownBooking(booking_id) => {
                ServiceError::NotFound(format!("booking `{booking_id}` not found"))
            }
            LedgerError::NotBlocked { booking_id } => ServiceError::InvalidState(format!(
                "booking `{booking_id}` has no matching blocked amount"
            )),
        }
    }
}

impl From<AssignmentError> for ServiceError {
    fn from(err: AssignmentError) -> Self {
        match err {
            AssignmentError::UnknownSlot(slot_id) => {
                ServiceError::NotFound(format!("slot `{slot_id}` not found"))
            }
            other => ServiceError::NoResourceAvailable(other.to_string()),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}
