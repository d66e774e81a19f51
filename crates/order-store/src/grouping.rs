//! Folding joined order rows back into orders.
//!
//! A read joins `orders` with `order_products`, which yields one row per line
//! item. [`OrderAccumulator`] groups those rows by order id. Orders without
//! line items arrive as a single row with no product columns and are kept.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{AccountId, LineItem, Money, Order, OrderId, PaymentStatus, ProductId};

/// One row of the `orders LEFT JOIN order_products` result.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub total_price: Money,
    pub payment_status: PaymentStatus,
    pub product_id: Option<ProductId>,
    pub quantity: Option<u32>,
}

/// Accumulates rows into orders keyed by order id.
///
/// Built once per query. Works with any row source: push rows one by one as a
/// cursor yields them, or `extend` from an iterator.
#[derive(Debug, Default)]
pub struct OrderAccumulator {
    index: HashMap<OrderId, usize>,
    orders: Vec<Order>,
}

impl OrderAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one row into the accumulator.
    pub fn push(&mut self, row: OrderRow) {
        let slot = match self.index.get(&row.order_id) {
            Some(&slot) => slot,
            None => {
                self.orders.push(Order {
                    id: row.order_id,
                    account_id: row.account_id,
                    created_at: row.created_at,
                    total_price: row.total_price,
                    payment_status: row.payment_status,
                    line_items: Vec::new(),
                });
                let slot = self.orders.len() - 1;
                self.index.insert(row.order_id, slot);
                slot
            }
        };

        if let (Some(product_id), Some(quantity)) = (row.product_id, row.quantity) {
            self.orders[slot]
                .line_items
                .push(LineItem::new(product_id, quantity));
        }
    }

    /// Number of distinct orders seen so far.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Returns the grouped orders sorted by id.
    pub fn finish(mut self) -> Vec<Order> {
        self.orders.sort_by_key(|o| o.id);
        self.orders
    }
}

impl Extend<OrderRow> for OrderAccumulator {
    fn extend<I: IntoIterator<Item = OrderRow>>(&mut self, iter: I) {
        for row in iter {
            self.push(row);
        }
    }
}

impl FromIterator<OrderRow> for OrderAccumulator {
    fn from_iter<I: IntoIterator<Item = OrderRow>>(iter: I) -> Self {
        let mut acc = Self::new();
        acc.extend(iter);
        acc
    }
}
