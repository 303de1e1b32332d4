//! Error types for fieldguide-intake
//!
//! [`IntakeError`] is the intake taxonomy; [`ApiError`] is its HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::intake::capture::DeviceError;
use crate::store::StoreError;

/// Failure of a single intake attempt
///
/// Every variant is terminal for the attempt that produced it; nothing is retried.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Bad operator input, detected before any remote call
    #[error("{0}")]
    Validation(String),

    /// Reference already recorded for this tour (local ledger or remote re-check)
    #[error("{}", duplicate_message(.reference, .from_scanner))]
    DuplicateTicket {
        reference: String,
        from_scanner: bool,
    },

    /// Camera unavailable, denied or failed
    #[error("{0}")]
    Device(#[from] DeviceError),

    /// Remote read/write/upload failure, message passed through verbatim
    #[error("{0}")]
    Remote(#[from] StoreError),

    #[error("There is no tour starting within the next hour.")]
    NoActiveTour,

    #[error("Not logged in.")]
    NotLoggedIn,

    #[error("No guide profile linked to this user.")]
    NoGuideProfile,

    #[error("No intake session is active.")]
    NoSession,

    /// Scan id is not in the current tour's list
    #[error("Ticket scan not found.")]
    UnknownScan(String),
}

/// Scanner duplicates name the ticket (shown as an alert); manual ones are inline text
fn duplicate_message(reference: &str, from_scanner: &bool) -> String {
    if *from_scanner {
        format!("Ticket {} already scanned.", reference)
    } else {
        "Ticket already scanned.".to_string()
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Intake refused or failed
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// fieldguide-common error
    #[error("Common error: {0}")]
    Common(#[from] fieldguide_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
            ApiError::Intake(ref err) => {
                let (status, code) = match err {
                    IntakeError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    IntakeError::DuplicateTicket { .. } => (StatusCode::CONFLICT, "DUPLICATE_TICKET"),
                    IntakeError::Device(_) => (StatusCode::SERVICE_UNAVAILABLE, "DEVICE_ERROR"),
                    IntakeError::Remote(_) => (StatusCode::BAD_GATEWAY, "REMOTE_ERROR"),
                    IntakeError::NoActiveTour => (StatusCode::CONFLICT, "NO_ACTIVE_TOUR"),
                    IntakeError::NotLoggedIn => (StatusCode::UNAUTHORIZED, "NOT_LOGGED_IN"),
                    IntakeError::NoGuideProfile => (StatusCode::FORBIDDEN, "NO_GUIDE_PROFILE"),
                    IntakeError::NoSession => (StatusCode::CONFLICT, "NO_SESSION"),
                    IntakeError::UnknownScan(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                };
                (status, code, err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
