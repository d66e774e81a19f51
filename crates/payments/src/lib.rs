//! Payment reconciliation.
//!
//! Inbound provider webhooks are verified, parsed and recorded in a
//! transaction ledger keyed by order id. The ledger is the source of truth;
//! the order's cached payment status is brought in line afterwards through an
//! [`OrderStatusSink`], with bounded retries. Rows whose push never landed
//! stay marked unsynced for an external reconciliation job.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod reconciler;
pub mod retry;
pub mod sink;
pub mod store;
pub mod transaction;
pub mod verify;
pub mod webhook;

pub use error::{LedgerError, LedgerResult, ReconcileError, Result, SinkError};
pub use memory::InMemoryTransactionStore;
pub use postgres::PostgresTransactionStore;
pub use reconciler::PaymentReconciler;
pub use retry::RetryPolicy;
pub use sink::OrderStatusSink;
pub use store::TransactionStore;
pub use transaction::{NewTransaction, PaymentOutcome, Transaction};
pub use verify::{
    HmacWebhookVerifier, NoopVerifier, WEBHOOK_ID_HEADER, WEBHOOK_SIGNATURE_HEADER,
    WEBHOOK_TIMESTAMP_HEADER, WebhookHeaders, WebhookVerifier,
};
pub use webhook::PaymentNotification;
