//! Wires configured backends into an [`AppState`].

use std::sync::Arc;

use events::{Broker, EventPublisher, InMemoryBroker, QueuedPublisher};
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use orders::{
    AccountGateway, CatalogGateway, HttpAccountGateway, HttpCatalogGateway,
    InMemoryAccountGateway, InMemoryCatalogGateway, OrderOrchestrator,
};
use payments::{
    HmacWebhookVerifier, InMemoryTransactionStore, NoopVerifier, PaymentReconciler,
    PostgresTransactionStore, TransactionStore, WebhookVerifier,
};
use sqlx::postgres::PgPoolOptions;

use crate::config::ServiceConfig;
use crate::error::StartupError;
use crate::{AppState, Orchestrator};

/// Messages the development broker keeps for inspection.
const DEV_BROKER_RETENTION: usize = 1000;

/// Running services and the handles needed to stop them.
pub struct Services {
    pub state: Arc<AppState>,
    pub publisher: QueuedPublisher,
    pub order_store: Arc<dyn OrderStore>,
}

impl Services {
    /// Builds every component from configuration.
    ///
    /// Must run inside a Tokio runtime: the event publisher worker is spawned
    /// here.
    pub async fn build(config: &ServiceConfig) -> Result<Self, StartupError> {
        let (order_store, ledger) = stores(config).await?;
        let accounts = account_gateway(config)?;
        let catalog = catalog_gateway(config)?;
        let publisher = QueuedPublisher::spawn(broker(config)?, config.publisher_capacity);

        let orchestrator: Arc<Orchestrator> = Arc::new(OrderOrchestrator::with_config(
            order_store.clone(),
            accounts,
            catalog,
            Arc::new(publisher.clone()) as Arc<dyn EventPublisher>,
            config.orchestrator(),
        ));

        let payments = PaymentReconciler::new(ledger, orchestrator.clone(), verifier(config)?)
            .with_push_timeout(config.payment_timeout);

        Ok(Self {
            state: Arc::new(AppState {
                orders: orchestrator,
                payments,
            }),
            publisher,
            order_store,
        })
    }

    /// Drains queued events and releases database connections.
    pub async fn shutdown(&self) {
        self.publisher.shutdown().await;
        self.order_store.close().await;
    }
}

async fn stores(
    config: &ServiceConfig,
) -> Result<(Arc<dyn OrderStore>, Arc<dyn TransactionStore>), StartupError> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;

            let orders = PostgresOrderStore::new(pool.clone());
            orders.run_migrations().await?;
            let ledger = PostgresTransactionStore::new(pool);
            ledger.run_migrations().await?;

            tracing::info!("using PostgreSQL stores");
            Ok((
                Arc::new(orders) as Arc<dyn OrderStore>,
                Arc::new(ledger) as Arc<dyn TransactionStore>,
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            Ok((
                Arc::new(InMemoryOrderStore::new()) as Arc<dyn OrderStore>,
                Arc::new(InMemoryTransactionStore::new()) as Arc<dyn TransactionStore>,
            ))
        }
    }
}

fn account_gateway(config: &ServiceConfig) -> Result<Arc<dyn AccountGateway>, StartupError> {
    match &config.account_endpoint {
        Some(url) => {
            tracing::info!(%url, "using account service");
            Ok(Arc::new(HttpAccountGateway::new(url.as_str(), config.rpc_timeout)?))
        }
        None => {
            tracing::warn!("ACCOUNT_URL not set, using an empty in-memory account service");
            Ok(Arc::new(InMemoryAccountGateway::new()))
        }
    }
}

fn catalog_gateway(config: &ServiceConfig) -> Result<Arc<dyn CatalogGateway>, StartupError> {
    match &config.catalog_endpoint {
        Some(url) => {
            tracing::info!(%url, "using catalog service");
            Ok(Arc::new(HttpCatalogGateway::new(url.as_str(), config.rpc_timeout)?))
        }
        None => {
            tracing::warn!("PRODUCT_URL not set, using an empty in-memory catalog");
            Ok(Arc::new(InMemoryCatalogGateway::new()))
        }
    }
}

#[cfg(feature = "kafka")]
fn broker(config: &ServiceConfig) -> Result<Arc<dyn Broker>, StartupError> {
    match &config.broker_endpoint {
        Some(servers) => Ok(Arc::new(events::KafkaBroker::new(servers)?)),
        None => {
            tracing::warn!("KAFKA_BOOTSTRAP_SERVERS not set, events are only logged");
            Ok(Arc::new(InMemoryBroker::with_retention(DEV_BROKER_RETENTION)))
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn broker(config: &ServiceConfig) -> Result<Arc<dyn Broker>, StartupError> {
    if config.broker_endpoint.is_some() {
        tracing::warn!("built without the kafka feature, events are only logged");
    }
    Ok(Arc::new(InMemoryBroker::with_retention(DEV_BROKER_RETENTION)))
}

fn verifier(config: &ServiceConfig) -> Result<Arc<dyn WebhookVerifier>, StartupError> {
    match &config.webhook_secret {
        Some(secret) => Ok(Arc::new(
            HmacWebhookVerifier::new(secret).map_err(StartupError::Verifier)?,
        )),
        None => {
            tracing::warn!("WEBHOOK_SECRET not set, payment webhooks are not verified");
            Ok(Arc::new(NoopVerifier))
        }
    }
}
