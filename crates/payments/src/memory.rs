use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use tokio::sync::RwLock;

use crate::{
    LedgerError, LedgerResult, NewTransaction, PaymentOutcome, Transaction, TransactionStore,
};

#[derive(Debug, Default)]
struct State {
    transactions: BTreeMap<OrderId, Transaction>,
    fail_on_write: bool,
    writes: usize,
}

/// In-memory transaction store for development and testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.write().await.fail_on_write = fail;
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of successful writes of any kind.
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }
}

fn check_writable(state: &State) -> LedgerResult<()> {
    if state.fail_on_write {
        return Err(LedgerError::WriteFailed("simulated write failure".to_string()));
    }
    Ok(())
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn register(&self, tx: &NewTransaction) -> LedgerResult<Transaction> {
        let mut state = self.state.write().await;
        check_writable(&state)?;
        state.writes += 1;

        let row = state
            .transactions
            .entry(tx.order_id)
            .or_insert_with(|| Transaction::opened(tx.clone(), Utc::now()));
        Ok(row.clone())
    }

    async fn apply_outcome(&self, outcome: &PaymentOutcome) -> LedgerResult<Transaction> {
        let mut state = self.state.write().await;
        check_writable(&state)?;
        state.writes += 1;

        let now = Utc::now();
        let row = state
            .transactions
            .entry(outcome.order_id)
            .and_modify(|tx| tx.apply(outcome, now))
            .or_insert_with(|| Transaction::from_outcome(outcome, now));
        Ok(row.clone())
    }

    async fn mark_synced(&self, order_id: OrderId, version: i64) -> LedgerResult<bool> {
        let mut state = self.state.write().await;
        check_writable(&state)?;

        let tx = state
            .transactions
            .get_mut(&order_id)
            .ok_or(LedgerError::NotFound(order_id))?;
        if tx.version != version {
            return Ok(false);
        }
        tx.order_synced = true;
        state.writes += 1;
        Ok(true)
    }

    async fn mark_unsynced(&self, order_id: OrderId) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        check_writable(&state)?;

        let tx = state
            .transactions
            .get_mut(&order_id)
            .ok_or(LedgerError::NotFound(order_id))?;
        tx.order_synced = false;
        state.writes += 1;
        Ok(())
    }

    async fn list_unsynced(&self) -> LedgerResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut unsynced: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| !tx.order_synced)
            .cloned()
            .collect();
        unsynced.sort_by_key(|tx| (tx.updated_at, tx.order_id));
        Ok(unsynced)
    }

    async fn get(&self, order_id: OrderId) -> LedgerResult<Option<Transaction>> {
        Ok(self.state.read().await.transactions.get(&order_id).cloned())
    }
}
