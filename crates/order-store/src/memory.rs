use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AccountId, LineItem, NewOrder, Order, OrderAccumulator, OrderId, OrderRow, PaymentStatus,
    Result, StoreError,
    store::{OrderStore, validate_line_items},
};

#[derive(Debug, Default)]
struct State {
    orders: BTreeMap<OrderId, Order>,
    line_item_rows: usize,
    last_id: i64,
    fail_after_line_items: Option<usize>,
    closed: bool,
}

/// In-memory order store for testing.
///
/// Mirrors the PostgreSQL semantics: ids come from a sequence, a `put` is all
/// or nothing, and reads group line items the same way. Failures can be
/// injected part-way through a `put` to exercise atomicity.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `put` fail after `count` line items have been
    /// written. `None` disables the failure.
    pub async fn fail_after_line_items(&self, count: Option<usize>) {
        self.state.write().await.fail_after_line_items = count;
    }

    /// Returns the number of stored order headers.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of stored line-item rows across all orders.
    pub async fn line_item_count(&self) -> usize {
        self.state.read().await.line_item_rows
    }

    fn rows_for(order: &Order) -> Vec<OrderRow> {
        let header = |item: Option<&LineItem>| OrderRow {
            order_id: order.id,
            account_id: order.account_id,
            created_at: order.created_at,
            total_price: order.total_price,
            payment_status: order.payment_status.clone(),
            product_id: item.map(|i| i.product_id.clone()),
            quantity: item.map(|i| i.quantity),
        };

        if order.line_items.is_empty() {
            vec![header(None)]
        } else {
            order.line_items.iter().map(|i| header(Some(i))).collect()
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn put(&self, order: &NewOrder) -> Result<OrderId> {
        validate_line_items(&order.line_items)?;

        let mut state = self.state.write().await;
        if state.closed {
            return Err(StoreError::Closed);
        }

        // Stage the header and items, then commit only if every item succeeded.
        let id = OrderId::new(state.last_id + 1);
        let mut staged = Vec::with_capacity(order.line_items.len());
        for item in &order.line_items {
            if state.fail_after_line_items == Some(staged.len()) {
                return Err(StoreError::WriteFailed(format!(
                    "injected failure inserting product {} for order {id}",
                    item.product_id
                )));
            }
            staged.push(LineItem::new(item.product_id.clone(), item.quantity));
        }

        state.last_id = id.value();
        state.line_item_rows += staged.len();
        let mut stored = order.clone().into_order(id);
        stored.line_items = staged;
        state.orders.insert(id, stored);

        Ok(id)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn get_by_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        if state.closed {
            return Err(StoreError::Closed);
        }

        let acc: OrderAccumulator = state
            .orders
            .values()
            .filter(|o| o.account_id == account_id)
            .flat_map(Self::rows_for)
            .collect();
        Ok(acc.finish())
    }

    async fn update_payment_status(
        &self,
        order_id: OrderId,
        status: &PaymentStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(StoreError::Closed);
        }

        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound(order_id))?;
        order.payment_status = status.clone();
        Ok(())
    }

    async fn close(&self) {
        self.state.write().await.closed = true;
    }
}
