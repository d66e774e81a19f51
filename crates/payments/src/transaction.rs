//! Ledger entries linking orders to provider payments.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, OrderId, PaymentStatus};
use serde::{Deserialize, Serialize};

/// One ledger row per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub order_id: OrderId,
    pub user_id: AccountId,
    pub customer_id: String,
    pub payment_id: String,
    pub total_price: Money,
    /// Amount the provider reports as settled. Overwritten, never summed.
    pub settled_price: Money,
    pub currency: String,
    pub status: PaymentStatus,
    /// False until the order's cached status has been brought in line.
    pub order_synced: bool,
    /// Bumped by every recorded outcome. The sync marker is only set for the
    /// version that was pushed.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A transaction opened at checkout, before the provider reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub order_id: OrderId,
    pub user_id: AccountId,
    pub customer_id: String,
    pub payment_id: String,
    pub total_price: Money,
    pub currency: String,
}

/// What a provider notification says about an order's payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub order_id: OrderId,
    pub user_id: AccountId,
    pub customer_id: String,
    pub payment_id: String,
    pub total_price: Money,
    pub settled_price: Money,
    pub currency: String,
    pub status: PaymentStatus,
}

impl Transaction {
    /// Builds a pending, unsettled row for a checkout.
    pub fn opened(new: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            order_id: new.order_id,
            user_id: new.user_id,
            customer_id: new.customer_id,
            payment_id: new.payment_id,
            total_price: new.total_price,
            settled_price: Money::zero(),
            currency: new.currency,
            status: PaymentStatus::pending(),
            order_synced: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the row for an outcome on an order that had no transaction yet.
    pub fn from_outcome(outcome: &PaymentOutcome, now: DateTime<Utc>) -> Self {
        let mut tx = Self {
            order_id: outcome.order_id,
            user_id: outcome.user_id,
            customer_id: String::new(),
            payment_id: String::new(),
            total_price: Money::zero(),
            settled_price: Money::zero(),
            currency: String::new(),
            status: PaymentStatus::pending(),
            order_synced: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tx.apply(outcome, now);
        tx
    }

    /// Overwrites this row with a provider outcome and marks it unsynced.
    pub fn apply(&mut self, outcome: &PaymentOutcome, now: DateTime<Utc>) {
        self.user_id = outcome.user_id;
        self.customer_id = outcome.customer_id.clone();
        self.payment_id = outcome.payment_id.clone();
        self.total_price = outcome.total_price;
        self.settled_price = outcome.settled_price;
        self.currency = outcome.currency.clone();
        self.status = outcome.status.clone();
        self.order_synced = false;
        self.version += 1;
        self.updated_at = now;
    }
}
