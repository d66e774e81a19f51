//! Order RPC surface.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AccountId, OrderId, PaymentStatus};
use order_store::{LineItem, Order};
use orders::RequestedItem;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub account_id: u64,
    pub products: Vec<OrderProductRequest>,
}

#[derive(Deserialize)]
pub struct OrderProductRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub account_id: u64,
    pub created_at: DateTime<Utc>,
    /// In cents.
    pub total_price: i64,
    pub payment_status: String,
    pub products: Vec<OrderProductResponse>,
}

#[derive(Serialize)]
pub struct OrderProductResponse {
    pub product_id: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.value(),
            account_id: order.account_id.value(),
            created_at: order.created_at,
            total_price: order.total_price.cents(),
            payment_status: order.payment_status.as_str().to_string(),
            products: order.line_items.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<LineItem> for OrderProductResponse {
    fn from(item: LineItem) -> Self {
        let (name, description, price) = match item.product {
            Some(p) => (Some(p.name), Some(p.description), Some(p.price.cents())),
            None => (None, None, None),
        };
        Self {
            product_id: item.product_id.as_str().to_string(),
            quantity: item.quantity,
            name,
            description,
            price,
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

// -- Handlers --

/// POST /orders: validate, price, persist and return the new order.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let req = json_body(payload)?;
    let items = req
        .products
        .into_iter()
        .map(|p| RequestedItem::new(p.product_id, p.quantity))
        .collect();

    let order = state
        .orders
        .post_order(AccountId::new(req.account_id), items)
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /accounts/{account_id}/orders
#[tracing::instrument(skip(state))]
pub async fn list_for_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<u64>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .orders
        .get_orders_for_account(AccountId::new(account_id))
        .await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{order_id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(OrderId::new(order_id)).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{order_id}/status
#[tracing::instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let req = json_body(payload)?;
    if req.status.trim().is_empty() {
        return Err(ApiError::BadRequest("status must not be empty".to_string()));
    }

    state
        .orders
        .update_order_status(OrderId::new(order_id), &PaymentStatus::new(req.status))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
