//! Value types shared by the order store, orchestrator and payment reconciler.

pub mod types;

pub use types::{AccountId, Money, OrderId, PaymentStatus, ProductId};
