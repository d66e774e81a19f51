use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{AccountId, LineItem, NewOrder, Order, OrderId, PaymentStatus, Result, StoreError};

/// Core trait for order store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order header and all of its line items.
    ///
    /// The writes are atomic: if any line item fails, no row for the order
    /// remains. Retrying is the caller's responsibility.
    async fn put(&self, order: &NewOrder) -> Result<OrderId>;

    /// Retrieves one order with its line items.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Retrieves every order of an account, ordered by id.
    ///
    /// Orders without line items are included.
    async fn get_by_account(&self, account_id: AccountId) -> Result<Vec<Order>>;

    /// Overwrites the payment status of an order.
    ///
    /// Applying the same status twice is not an error. Fails with
    /// `NotFound` when no order has the given id.
    async fn update_payment_status(&self, order_id: OrderId, status: &PaymentStatus)
    -> Result<()>;

    /// Releases the underlying connections. Calling it again does nothing.
    async fn close(&self);
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn put(&self, order: &NewOrder) -> Result<OrderId> {
        (**self).put(order).await
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).get(order_id).await
    }

    async fn get_by_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        (**self).get_by_account(account_id).await
    }

    async fn update_payment_status(
        &self,
        order_id: OrderId,
        status: &PaymentStatus,
    ) -> Result<()> {
        (**self).update_payment_status(order_id, status).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Largest quantity a line item can hold; the column is a 32-bit integer.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Validates line items before anything is written.
///
/// Every quantity must be in `1..=MAX_QUANTITY`, product ids must be
/// non-empty, and a product may appear only once per order.
pub fn validate_line_items(items: &[LineItem]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.product_id.is_empty() {
            return Err(StoreError::Validation(
                "product id must not be empty".to_string(),
            ));
        }
        if item.quantity == 0 {
            return Err(StoreError::Validation(format!(
                "quantity for product {} must be greater than 0",
                item.product_id
            )));
        }
        if item.quantity > MAX_QUANTITY {
            return Err(StoreError::Validation(format!(
                "quantity {} for product {} exceeds {MAX_QUANTITY}",
                item.quantity, item.product_id
            )));
        }
        if !seen.insert(&item.product_id) {
            return Err(StoreError::Validation(format!(
                "product {} appears more than once",
                item.product_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_positive_quantities() {
        let items = vec![LineItem::new("a", 1), LineItem::new("b", 7)];
        assert!(validate_line_items(&items).is_ok());
        assert!(validate_line_items(&[]).is_ok());
    }

    #[test]
    fn rejects_zero_quantity() {
        let err = validate_line_items(&[LineItem::new("a", 0)]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn rejects_quantity_above_column_range() {
        assert!(validate_line_items(&[LineItem::new("a", MAX_QUANTITY)]).is_ok());
        let err = validate_line_items(&[LineItem::new("a", MAX_QUANTITY + 1)]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn rejects_empty_product_id() {
        let err = validate_line_items(&[LineItem::new("", 1)]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_products() {
        let items = vec![LineItem::new("a", 1), LineItem::new("a", 2)];
        let err = validate_line_items(&items).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
