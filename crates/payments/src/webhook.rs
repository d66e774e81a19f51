//! Provider notification body.

use common::{AccountId, Money, OrderId, PaymentStatus};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{PaymentOutcome, ReconcileError, Result};

/// Top-level webhook body: `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentNotification {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentData {
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub product_cart: Vec<CartItem>,
    pub payment_id: String,
    pub metadata: Metadata,
    pub total_amount: i64,
    #[serde(default)]
    pub settled_amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Customer {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
}

/// Ids we attached at checkout. Providers echo them back as strings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(deserialize_with = "numeric_id")]
    pub order_id: i64,
    #[serde(deserialize_with = "numeric_id")]
    pub user_id: i64,
}

fn numeric_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a numeric id, got {s:?}"))),
    }
}

impl PaymentNotification {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| ReconcileError::InvalidPayload(e.to_string()))
    }

    /// Converts the notification into a ledger outcome.
    pub fn outcome(&self) -> Result<PaymentOutcome> {
        let data = &self.data;
        let user_id = u64::try_from(data.metadata.user_id).map_err(|_| {
            ReconcileError::InvalidPayload(format!("invalid user id {}", data.metadata.user_id))
        })?;
        if data.status.trim().is_empty() {
            return Err(ReconcileError::InvalidPayload("status must not be empty".to_string()));
        }
        if data.total_amount < 0 || data.settled_amount < 0 {
            return Err(ReconcileError::InvalidPayload("amounts must not be negative".to_string()));
        }

        Ok(PaymentOutcome {
            order_id: OrderId::new(data.metadata.order_id),
            user_id: AccountId::new(user_id),
            customer_id: data.customer.customer_id.clone(),
            payment_id: data.payment_id.clone(),
            total_price: Money::from_cents(data.total_amount),
            settled_price: Money::from_cents(data.settled_amount),
            currency: data.currency.clone(),
            status: PaymentStatus::new(data.status.clone()),
        })
    }
}
