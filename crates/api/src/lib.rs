//! HTTP surface for order orchestration and payment reconciliation.
//!
//! Exposes the order RPC surface and the payment webhook over REST, with
//! structured logging (tracing) and Prometheus metrics.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use events::EventPublisher;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use orders::{AccountGateway, CatalogGateway, OrderOrchestrator};
use payments::{PaymentReconciler, TransactionStore, WebhookVerifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Orchestrator over whichever backends were configured at startup.
pub type Orchestrator = OrderOrchestrator<
    Arc<dyn OrderStore>,
    Arc<dyn AccountGateway>,
    Arc<dyn CatalogGateway>,
    Arc<dyn EventPublisher>,
>;

/// Reconciler pushing statuses into the shared [`Orchestrator`].
pub type Reconciler =
    PaymentReconciler<Arc<dyn TransactionStore>, Arc<Orchestrator>, Arc<dyn WebhookVerifier>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: Arc<Orchestrator>,
    pub payments: Reconciler,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{order_id}", get(routes::orders::get))
        .route("/orders/{order_id}/status", put(routes::orders::update_status))
        .route(
            "/accounts/{account_id}/orders",
            get(routes::orders::list_for_account),
        )
        .route("/webhooks/payment", post(routes::payments::webhook))
        .route("/payments/checkout", post(routes::payments::checkout))
        .route("/payments/unsynced", get(routes::payments::unsynced))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
