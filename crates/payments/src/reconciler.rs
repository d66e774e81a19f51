//! Turns provider notifications into ledger rows and order status pushes.

use std::time::{Duration, Instant};

use common::OrderId;

use crate::{
    NewTransaction, OrderStatusSink, PaymentNotification, ReconcileError, Result, RetryPolicy,
    SinkError, Transaction, TransactionStore, WebhookHeaders, WebhookVerifier,
};

/// Times a push is repeated because the ledger moved underneath it.
const MAX_SYNC_ROUNDS: usize = 3;

/// Records payment outcomes and pushes them to the order service.
///
/// The ledger write is the commit point. The status push that follows is
/// best effort: it is retried under [`RetryPolicy`], and if it never lands
/// the row stays unsynced for [`list_unsynced`](Self::list_unsynced).
pub struct PaymentReconciler<T, O, V>
where
    T: TransactionStore,
    O: OrderStatusSink,
    V: WebhookVerifier,
{
    ledger: T,
    orders: O,
    verifier: V,
    retry: RetryPolicy,
    push_timeout: Duration,
}

impl<T, O, V> PaymentReconciler<T, O, V>
where
    T: TransactionStore,
    O: OrderStatusSink,
    V: WebhookVerifier,
{
    pub fn new(ledger: T, orders: O, verifier: V) -> Self {
        Self {
            ledger,
            orders,
            verifier,
            retry: RetryPolicy::default(),
            push_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Deadline for each status push attempt.
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    pub fn ledger(&self) -> &T {
        &self.ledger
    }

    /// Verifies, parses and records a webhook, then syncs the order.
    ///
    /// Fails only if the notification is rejected or cannot be recorded. A
    /// failed status push is logged and reflected in `order_synced`.
    #[tracing::instrument(skip_all)]
    pub async fn handle_webhook(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<Transaction> {
        let start = Instant::now();
        let result = self.reconcile(headers, body).await;
        metrics::histogram!("webhook_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(tx) => {
                metrics::counter!("webhooks_processed_total").increment(1);
                tracing::info!(
                    order_id = %tx.order_id,
                    status = %tx.status,
                    settled = %tx.settled_price,
                    synced = tx.order_synced,
                    "payment reconciled"
                );
            }
            Err(e) => {
                let reason = match e {
                    ReconcileError::InvalidPayload(_) => "invalid_payload",
                    ReconcileError::Verification(_) => "verification",
                    ReconcileError::Persistence(_) => "persistence",
                };
                metrics::counter!("webhooks_rejected_total", "reason" => reason).increment(1);
                tracing::warn!(error = %e, "payment webhook rejected");
            }
        }
        result
    }

    async fn reconcile(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<Transaction> {
        self.verifier.verify(headers, body)?;
        let notification = PaymentNotification::parse(body)?;
        tracing::debug!(event_type = %notification.event_type, "payment notification received");

        let outcome = notification.outcome()?;
        let tx = self.ledger.apply_outcome(&outcome).await?;
        Ok(self.sync(tx).await)
    }

    /// Pushes the row's status and marks the pushed version synced.
    ///
    /// If another outcome was recorded while the push was in flight, the
    /// order may now hold the older status, so the latest row is pushed
    /// again. Returns the row as last read.
    async fn sync(&self, mut tx: Transaction) -> Transaction {
        let order_id = tx.order_id;
        let mut superseded = false;

        for _ in 0..MAX_SYNC_ROUNDS {
            if !self.push(&tx).await {
                break;
            }
            match self.ledger.mark_synced(order_id, tx.version).await {
                Ok(true) => {
                    tx.order_synced = true;
                    return tx;
                }
                Ok(false) => superseded = true,
                Err(e) => {
                    tracing::warn!(%order_id, error = %e, "failed to mark transaction synced");
                    break;
                }
            }

            match self.ledger.get(order_id).await {
                Ok(Some(latest)) => {
                    tracing::debug!(
                        %order_id,
                        pushed = tx.version,
                        latest = latest.version,
                        "ledger moved during status push; pushing latest"
                    );
                    tx = latest;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(%order_id, error = %e, "failed to reload transaction");
                    break;
                }
            }
        }

        // A stale push may have landed after a newer one was marked synced.
        if superseded {
            if let Err(e) = self.ledger.mark_unsynced(order_id).await {
                tracing::warn!(%order_id, error = %e, "failed to flag transaction unsynced");
            }
        }
        tx.order_synced = false;
        tx
    }

    /// Pushes the transaction status to the order service under the retry
    /// policy. Returns whether it landed.
    async fn push(&self, tx: &Transaction) -> bool {
        let order_id = tx.order_id;
        let attempts = self.retry.attempts();
        for attempt in 1..=attempts {
            let outcome = tokio::time::timeout(
                self.push_timeout,
                self.orders.push_status(order_id, &tx.status),
            )
            .await
            .unwrap_or_else(|_| {
                Err(SinkError::Unavailable(format!(
                    "timed out after {:?}",
                    self.push_timeout
                )))
            });

            match outcome {
                Ok(()) => {
                    metrics::counter!("order_status_pushes_total", "result" => "ok").increment(1);
                    return true;
                }
                Err(e) if !e.is_retryable() => {
                    metrics::counter!("order_status_pushes_total", "result" => "not_found")
                        .increment(1);
                    tracing::warn!(%order_id, error = %e, "order status push rejected");
                    return false;
                }
                Err(e) if attempt < attempts => {
                    let backoff = self.retry.backoff(attempt);
                    tracing::debug!(%order_id, attempt, ?backoff, error = %e, "retrying order status push");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::warn!(%order_id, attempts, error = %e, "order status push failed; left unsynced");
                }
            }
        }
        metrics::counter!("order_status_pushes_total", "result" => "exhausted").increment(1);
        false
    }

    /// Opens a pending transaction for a checkout.
    #[tracing::instrument(skip(self, tx), fields(order_id = %tx.order_id))]
    pub async fn register(&self, tx: &NewTransaction) -> Result<Transaction> {
        Ok(self.ledger.register(tx).await?)
    }

    /// Transactions whose order status has not been synced.
    pub async fn list_unsynced(&self) -> Result<Vec<Transaction>> {
        Ok(self.ledger.list_unsynced().await?)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Option<Transaction>> {
        Ok(self.ledger.get(order_id).await?)
    }
}
