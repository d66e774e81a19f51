//! Where reconciled statuses are pushed.

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, PaymentStatus};
use events::EventPublisher;
use order_store::OrderStore;
use orders::{AccountGateway, CatalogGateway, OrderError, OrderOrchestrator};

use crate::SinkError;

/// Receives payment statuses for orders.
///
/// The only way the reconciler touches orders; it never writes the order
/// store itself.
#[async_trait]
pub trait OrderStatusSink: Send + Sync {
    async fn push_status(&self, order_id: OrderId, status: &PaymentStatus)
    -> Result<(), SinkError>;
}

#[async_trait]
impl<T: OrderStatusSink + ?Sized> OrderStatusSink for Arc<T> {
    async fn push_status(
        &self,
        order_id: OrderId,
        status: &PaymentStatus,
    ) -> Result<(), SinkError> {
        (**self).push_status(order_id, status).await
    }
}

#[async_trait]
impl<S, A, C, P> OrderStatusSink for OrderOrchestrator<S, A, C, P>
where
    S: OrderStore,
    A: AccountGateway,
    C: CatalogGateway,
    P: EventPublisher,
{
    async fn push_status(
        &self,
        order_id: OrderId,
        status: &PaymentStatus,
    ) -> Result<(), SinkError> {
        self.update_order_status(order_id, status)
            .await
            .map_err(|e| match e {
                OrderError::OrderNotFound(id) => SinkError::NotFound(id),
                other => SinkError::Unavailable(other.to_string()),
            })
    }
}
