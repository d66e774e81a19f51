use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;

use crate::{LedgerResult, NewTransaction, PaymentOutcome, Transaction};

/// Durable ledger of payment transactions, one row per order.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Opens a pending transaction at checkout. Registering an order twice
    /// keeps the first row.
    async fn register(&self, tx: &NewTransaction) -> LedgerResult<Transaction>;

    /// Records a provider outcome, keyed by order id.
    ///
    /// Status and amounts are overwritten, so a replayed notification leaves
    /// the row as the first one did. The row is marked unsynced and its
    /// version bumped.
    async fn apply_outcome(&self, outcome: &PaymentOutcome) -> LedgerResult<Transaction>;

    /// Records that the order's cached status now matches `version` of this
    /// row. Returns `false`, changing nothing, if the row has moved past it.
    async fn mark_synced(&self, order_id: OrderId, version: i64) -> LedgerResult<bool>;

    /// Flags the row for the reconciliation job whatever its version.
    async fn mark_unsynced(&self, order_id: OrderId) -> LedgerResult<()>;

    /// Transactions whose order status push has not landed, oldest first.
    async fn list_unsynced(&self) -> LedgerResult<Vec<Transaction>>;

    async fn get(&self, order_id: OrderId) -> LedgerResult<Option<Transaction>>;
}

#[async_trait]
impl<T: TransactionStore + ?Sized> TransactionStore for Arc<T> {
    async fn register(&self, tx: &NewTransaction) -> LedgerResult<Transaction> {
        (**self).register(tx).await
    }

    async fn apply_outcome(&self, outcome: &PaymentOutcome) -> LedgerResult<Transaction> {
        (**self).apply_outcome(outcome).await
    }

    async fn mark_synced(&self, order_id: OrderId, version: i64) -> LedgerResult<bool> {
        (**self).mark_synced(order_id, version).await
    }

    async fn mark_unsynced(&self, order_id: OrderId) -> LedgerResult<()> {
        (**self).mark_unsynced(order_id).await
    }

    async fn list_unsynced(&self) -> LedgerResult<Vec<Transaction>> {
        (**self).list_unsynced().await
    }

    async fn get(&self, order_id: OrderId) -> LedgerResult<Option<Transaction>> {
        (**self).get(order_id).await
    }
}
