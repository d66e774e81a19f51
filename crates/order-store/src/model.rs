//! Order entities as the store reads and writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Money, OrderId, PaymentStatus, ProductId};

/// Display fields for a product, taken from the catalog.
///
/// Never persisted. Filled in from a pricing snapshot on creation and from a
/// live catalog lookup on reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub description: String,
    pub price: Money,
}

/// One product/quantity pair within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductDetails>,
}

impl LineItem {
    /// Creates a line item without display fields.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            product: None,
        }
    }

    /// Attaches catalog display fields.
    pub fn with_product(mut self, product: ProductDetails) -> Self {
        self.product = Some(product);
        self
    }

    /// Price times quantity, when the unit price is known.
    pub fn subtotal(&self) -> Option<Money> {
        self.product
            .as_ref()
            .map(|p| p.price.multiply(self.quantity))
    }
}

/// An order that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub total_price: Money,
    pub payment_status: PaymentStatus,
    pub line_items: Vec<LineItem>,
}

impl NewOrder {
    /// Creates a pending order stamped with the current UTC time.
    pub fn new(account_id: AccountId, total_price: Money, line_items: Vec<LineItem>) -> Self {
        Self {
            account_id,
            created_at: Utc::now(),
            total_price,
            payment_status: PaymentStatus::pending(),
            line_items,
        }
    }

    /// Builds the stored order once the store has assigned an id.
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            account_id: self.account_id,
            created_at: self.created_at,
            total_price: self.total_price,
            payment_status: self.payment_status,
            line_items: self.line_items,
        }
    }
}

/// A persisted order with its line items attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    /// Frozen at creation; later catalog price changes do not affect it.
    pub total_price: Money,
    pub payment_status: PaymentStatus,
    pub line_items: Vec<LineItem>,
}

impl Order {
    /// Product id of every line item, in line-item order.
    pub fn product_ids(&self) -> impl Iterator<Item = &ProductId> {
        self.line_items.iter().map(|item| &item.product_id)
    }
}
