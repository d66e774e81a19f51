//! Order orchestrator coordinating the account and catalog services, the
//! order store and the event publisher.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};

use common::{AccountId, OrderId, PaymentStatus, ProductId};
use events::{Event, EventPublisher, topics};
use order_store::{NewOrder, Order, OrderStore, ProductDetails};

use crate::pricing::{self, MatchPolicy, RequestedItem};
use crate::{
    AccountGateway, CatalogGateway, GatewayError, OrderError, Product, ProductQuery, Result,
};

const ACCOUNT_SERVICE: &str = "account";
const CATALOG_SERVICE: &str = "catalog";

/// Tunables for [`OrderOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Deadline applied to each account or catalog call.
    pub rpc_timeout: Duration,
    pub match_policy: MatchPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(5),
            match_policy: MatchPolicy::Lenient,
        }
    }
}

/// Creates and reads orders.
///
/// Creation validates the account, prices the request from one catalog
/// snapshot and persists the order atomically. Purchase events are handed to
/// the publisher afterwards; a publishing problem never fails the order.
pub struct OrderOrchestrator<S, A, C, P>
where
    S: OrderStore,
    A: AccountGateway,
    C: CatalogGateway,
    P: EventPublisher,
{
    store: S,
    accounts: A,
    catalog: C,
    publisher: P,
    config: OrchestratorConfig,
}

impl<S, A, C, P> OrderOrchestrator<S, A, C, P>
where
    S: OrderStore,
    A: AccountGateway,
    C: CatalogGateway,
    P: EventPublisher,
{
    pub fn new(store: S, accounts: A, catalog: C, publisher: P) -> Self {
        Self::with_config(store, accounts, catalog, publisher, OrchestratorConfig::default())
    }

    pub fn with_config(
        store: S,
        accounts: A,
        catalog: C,
        publisher: P,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            accounts,
            catalog,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns a reference to the underlying order store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order for an account.
    ///
    /// Nothing is written unless the account exists and at least one
    /// requested product is priced. The returned order carries the catalog
    /// details used for pricing.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn post_order(
        &self,
        account_id: AccountId,
        items: Vec<RequestedItem>,
    ) -> Result<Order> {
        let start = Instant::now();
        let result = self.create_order(account_id, items).await;
        metrics::histogram!("order_create_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total_price,
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("orders_failed_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, "order creation failed");
            }
        }
        result
    }

    async fn create_order(&self, account_id: AccountId, items: Vec<RequestedItem>) -> Result<Order> {
        let requested = pricing::merge_requested(&items)?;

        self.call(ACCOUNT_SERVICE, self.accounts.get_account(account_id))
            .await
            .map_err(|e| match e {
                OrderError::UpstreamUnavailable {
                    source: GatewayError::NotFound,
                    ..
                } => OrderError::AccountNotFound(account_id),
                other => other,
            })?;

        let ids = requested.iter().map(|item| item.product_id.clone());
        let products = self.lookup_products(ProductQuery::by_ids(ids)).await?;

        let priced = pricing::price_items(&requested, &products, self.config.match_policy)?;
        if priced.line_items.is_empty() {
            return Err(OrderError::Validation(
                "none of the requested products exist in the catalog".to_string(),
            ));
        }

        let new_order = NewOrder::new(account_id, priced.total, priced.line_items);
        let order_id = self.store.put(&new_order).await?;
        let order = new_order.into_order(order_id);

        self.emit_purchases(&order);
        Ok(order)
    }

    /// Hands one purchase event per line item to the publisher.
    fn emit_purchases(&self, order: &Order) {
        for product_id in order.product_ids() {
            let event = Event::purchase(order.account_id, product_id);
            if let Err(e) = self.publisher.publish(topics::INTERACTION_EVENTS, &event) {
                tracing::warn!(
                    order_id = %order.id,
                    product_id = %product_id,
                    error = %e,
                    "purchase event not queued"
                );
            }
        }
    }

    /// Lists the orders of an account, each line item decorated with its
    /// current catalog details.
    ///
    /// Makes at most one catalog call for all orders. Products the catalog no
    /// longer knows are left undecorated.
    #[tracing::instrument(skip(self))]
    pub async fn get_orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let mut orders = self.store.get_by_account(account_id).await?;
        self.decorate(&mut orders).await?;
        tracing::debug!(count = orders.len(), "orders loaded");
        Ok(orders)
    }

    /// Loads one order with current catalog details.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        let mut orders = vec![order];
        self.decorate(&mut orders).await?;
        orders.pop().ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Overwrites the payment status of an order. Idempotent.
    #[tracing::instrument(skip(self), fields(status = %status))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: &PaymentStatus,
    ) -> Result<()> {
        self.store.update_payment_status(order_id, status).await?;
        metrics::counter!("order_status_updates_total").increment(1);
        tracing::info!("order payment status updated");
        Ok(())
    }

    async fn decorate(&self, orders: &mut [Order]) -> Result<()> {
        let ids: BTreeSet<ProductId> = orders
            .iter()
            .flat_map(|order| order.product_ids().cloned())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let products = self.lookup_products(ProductQuery::by_ids(ids)).await?;
        let by_id: HashMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id.clone(), p)).collect();

        for item in orders.iter_mut().flat_map(|order| order.line_items.iter_mut()) {
            if let Some(product) = by_id.get(&item.product_id) {
                item.product = Some(ProductDetails {
                    name: product.name.clone(),
                    description: product.description.clone(),
                    price: product.price,
                });
            }
        }
        Ok(())
    }

    async fn lookup_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        metrics::counter!("catalog_lookups_total").increment(1);
        self.call(CATALOG_SERVICE, self.catalog.get_products(&query))
            .await
    }

    /// Runs a remote call under the configured deadline.
    async fn call<T>(
        &self,
        service: &'static str,
        fut: impl Future<Output = std::result::Result<T, GatewayError>>,
    ) -> Result<T> {
        let timeout = self.config.rpc_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(OrderError::upstream(service, e)),
            Err(_) => {
                tracing::warn!(service, ?timeout, "remote call timed out");
                Err(OrderError::upstream(service, GatewayError::Timeout(timeout)))
            }
        }
    }
}
