//! Payment provider webhook and ledger inspection.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use common::OrderId;
use payments::{
    NewTransaction, Transaction, WEBHOOK_ID_HEADER, WEBHOOK_SIGNATURE_HEADER,
    WEBHOOK_TIMESTAMP_HEADER, WebhookHeaders,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub order_id: i64,
    pub customer_id: String,
    pub payment_id: String,
    pub currency: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub order_id: i64,
    pub status: String,
    pub order_synced: bool,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// POST /webhooks/payment
///
/// Answers 200 once the transaction is recorded, whether or not the order
/// status push landed. Non-2xx only for payloads the provider should resend
/// or fix.
#[tracing::instrument(skip_all)]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = WebhookHeaders {
        id: header(&headers, WEBHOOK_ID_HEADER),
        timestamp: header(&headers, WEBHOOK_TIMESTAMP_HEADER),
        signature: header(&headers, WEBHOOK_SIGNATURE_HEADER),
    };

    let tx = state.payments.handle_webhook(&signature, &body).await?;
    Ok(Json(WebhookResponse {
        order_id: tx.order_id.value(),
        status: tx.status.as_str().to_string(),
        order_synced: tx.order_synced,
    }))
}

/// GET /payments/unsynced: transactions whose order status still lags.
#[tracing::instrument(skip(state))]
pub async fn unsynced(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.payments.list_unsynced().await?))
}

/// POST /payments/checkout: opens the pending ledger row for an order once
/// the provider has issued a payment for it.
///
/// The account and amount come from the stored order. Registering an order
/// again returns the row already open.
#[tracing::instrument(skip(state, payload))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    for (field, value) in [
        ("customer_id", &req.customer_id),
        ("payment_id", &req.payment_id),
        ("currency", &req.currency),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{field} must not be empty")));
        }
    }

    let order = state.orders.get_order(OrderId::new(req.order_id)).await?;
    let tx = state
        .payments
        .register(&NewTransaction {
            order_id: order.id,
            user_id: order.account_id,
            customer_id: req.customer_id,
            payment_id: req.payment_id,
            total_price: order.total_price,
            currency: req.currency,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(tx)))
}
