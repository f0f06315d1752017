use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard JSON error body returned by the HTTP layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Errors produced by the procurement services.
///
/// Validation and state-conflict errors propagate synchronously to the
/// caller and never leave partial mutations behind. Delivery failures are
/// recorded on the notification record and surfaced through events, never
/// to an interactive caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(
        "Over-receipt on order line {order_line_id}: {requested} requested but only {pending} pending"
    )]
    OverReceipt {
        order_line_id: Uuid,
        pending: Decimal,
        requested: Decimal,
    },

    #[error("Negative quantity on order line {order_line_id}: {requested}")]
    NegativeQuantity {
        order_line_id: Uuid,
        requested: Decimal,
    },

    #[error("Response window closed: {0}")]
    ResponseWindowClosed(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::NegativeQuantity { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidState(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::OverReceipt { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ResponseWindowClosed(_) => StatusCode::GONE,
            Self::InvalidToken(_) => StatusCode::NOT_FOUND,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// text to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn over_receipt_carries_exact_pending_amount() {
        let id = Uuid::new_v4();
        let err = ServiceError::OverReceipt {
            order_line_id: id,
            pending: dec!(8),
            requested: dec!(12),
        };
        let msg = err.to_string();
        assert!(msg.contains("12 requested"));
        assert!(msg.contains("only 8 pending"));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn state_conflicts_map_to_409() {
        let err = ServiceError::Conflict("quote already linked to a purchase order".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
