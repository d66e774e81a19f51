use common::{AccountId, OrderId, ProductId};
use order_store::StoreError;
use thiserror::Error;

use crate::GatewayError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request was malformed; nothing external was called.
    #[error("Invalid order: {0}")]
    Validation(String),

    /// The account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Products the catalog does not know (strict matching only).
    #[error("Products not found: {}", join_ids(.0))]
    ProductNotFound(Vec<ProductId>),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A remote service timed out or could not be reached.
    #[error("{service} service unavailable: {source}")]
    UpstreamUnavailable {
        service: &'static str,
        #[source]
        source: GatewayError,
    },

    /// The order store failed; assume no order was created.
    #[error("Persistence error: {0}")]
    Persistence(StoreError),
}

impl OrderError {
    /// Returns true for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OrderError::AccountNotFound(_)
                | OrderError::ProductNotFound(_)
                | OrderError::OrderNotFound(_)
        )
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::AccountNotFound(_) => "account_not_found",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::UpstreamUnavailable { .. } => "upstream_unavailable",
            OrderError::Persistence(_) => "persistence",
        }
    }

    pub(crate) fn upstream(service: &'static str, source: GatewayError) -> Self {
        OrderError::UpstreamUnavailable { service, source }
    }
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => OrderError::OrderNotFound(id),
            StoreError::Validation(msg) => OrderError::Validation(msg),
            other => OrderError::Persistence(other),
        }
    }
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(ProductId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
