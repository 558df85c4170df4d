//! Maps [`Error`] to JSON responses.
//!
//! Body shape: `{"error": "<code>", "message": "<text>"}`. Server-side
//! failures are logged and answered with a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::errors::Error;

impl Error {
    /// HTTP status and machine-readable code for this error.
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation { .. } | Self::Upload { .. } => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Self::InvalidAmount { .. } => (StatusCode::BAD_REQUEST, "invalid_amount"),
            Self::InvalidDiscount { .. } => (StatusCode::BAD_REQUEST, "invalid_discount"),
            Self::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, "insufficient_stock"),
            Self::PaymentFailed { .. } => (StatusCode::BAD_REQUEST, "payment_failed"),
            Self::PaymentNotConfirmed { .. } => {
                (StatusCode::BAD_REQUEST, "payment_not_confirmed")
            }
            Self::ClientNotFound { .. }
            | Self::ClientEmailNotFound { .. }
            | Self::ProductNotFound { .. }
            | Self::OrderNotFound { .. }
            | Self::PaymentNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            Self::PaymentAlreadyExists { .. } => (StatusCode::CONFLICT, "payment_already_exists"),
            Self::Gateway(_) => (StatusCode::BAD_GATEWAY, "gateway_error"),
            Self::Config { .. }
            | Self::Database(_)
            | Self::Template(_)
            | Self::Io(_)
            | Self::EnvVar(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Log the actual error, return generic message
            tracing::error!("Request failed: {}", self);
            "an internal error occurred".to_string()
        } else {
            if status == StatusCode::BAD_GATEWAY {
                tracing::warn!("Payment gateway error: {}", self);
            }
            self.to_string()
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::gateway::GatewayError;
    use axum::body::to_bytes;

    async fn body_of(err: Error) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let (status, body) = body_of(Error::validation("Client name cannot be empty")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("Client name"));
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, body) = body_of(Error::OrderNotFound { id: 7 }).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn already_paid_is_409() {
        let (status, body) = body_of(Error::PaymentAlreadyExists { order_id: 3 }).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "payment_already_exists");
    }

    #[tokio::test]
    async fn gateway_error_is_502_with_message() {
        let err = Error::Gateway(GatewayError::Api {
            status: 500,
            message: "Stripe is down".to_string(),
        });
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap().contains("Stripe is down"));
    }

    #[tokio::test]
    async fn database_error_is_hidden() {
        let err = Error::Database(sea_orm::DbErr::Custom("secret table".to_string()));
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "an internal error occurred");
    }
}
