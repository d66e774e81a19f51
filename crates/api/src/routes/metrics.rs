//! Prometheus scrape endpoint and metric descriptions.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}

/// Registers help text for the metrics the service records.
pub fn describe() {
    describe_counter!("orders_created_total", "Orders persisted");
    describe_counter!("orders_failed_total", "Order creations rejected, by reason");
    describe_counter!("catalog_lookups_total", "Batched catalog calls");
    describe_counter!("order_status_updates_total", "Payment status overwrites");
    describe_histogram!("order_create_duration_seconds", "Order creation latency");
    describe_histogram!("order_store_put_duration_seconds", "Order insert transaction latency");
    describe_histogram!("order_store_read_duration_seconds", "Account order read latency");
    describe_counter!("events_published_total", "Events acknowledged by the broker, by topic");
    describe_counter!("events_dropped_total", "Events not delivered, by reason");
    describe_counter!("webhooks_processed_total", "Payment webhooks recorded");
    describe_counter!("webhooks_rejected_total", "Payment webhooks rejected, by reason");
    describe_histogram!("webhook_duration_seconds", "Payment webhook handling latency");
    describe_counter!("order_status_pushes_total", "Reconciler status pushes, by result");
}
