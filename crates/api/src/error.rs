//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orders::{GatewayError, OrderError};
use payments::{LedgerError, ReconcileError};
use thiserror::Error;

use crate::config::ConfigError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Order orchestration error.
    Order(OrderError),
    /// Payment webhook error.
    Payment(ReconcileError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    let status = match &err {
        OrderError::Validation(_) => StatusCode::BAD_REQUEST,
        OrderError::AccountNotFound(_)
        | OrderError::ProductNotFound(_)
        | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        OrderError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn payment_error_to_response(err: ReconcileError) -> (StatusCode, String) {
    match &err {
        ReconcileError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        ReconcileError::Verification(_) => (StatusCode::UNAUTHORIZED, err.to_string()),
        ReconcileError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Payment(err)
    }
}

/// Errors that stop the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("order store error: {0}")]
    OrderStore(#[from] order_store::StoreError),

    #[error("transaction store error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("event broker error: {0}")]
    Broker(#[from] events::PublishError),

    #[error("webhook verifier error: {0}")]
    Verifier(ReconcileError),

    #[error("metrics recorder error: {0}")]
    Metrics(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
