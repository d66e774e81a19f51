//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::{AppState, Orchestrator};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use common::{Money, OrderId, PaymentStatus};
use events::{EventPublisher, InMemoryBroker, QueuedPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderStore, OrderStore};
use orders::{
    AccountGateway, CatalogGateway, InMemoryAccountGateway, InMemoryCatalogGateway,
    OrderOrchestrator,
};
use payments::{
    HmacWebhookVerifier, InMemoryTransactionStore, PaymentReconciler, TransactionStore,
    WebhookVerifier,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryOrderStore,
    ledger: InMemoryTransactionStore,
    catalog: InMemoryCatalogGateway,
    broker: InMemoryBroker,
    publisher: QueuedPublisher,
}

async fn setup() -> TestApp {
    let store = InMemoryOrderStore::new();
    let ledger = InMemoryTransactionStore::new();
    let accounts = InMemoryAccountGateway::new().with_account(42).await;
    let catalog = InMemoryCatalogGateway::new()
        .with_product("prod-A", Money::from_dollars(10))
        .await
        .with_product("prod-B", Money::from_dollars(5))
        .await;
    let broker = InMemoryBroker::new();
    let publisher = QueuedPublisher::spawn(Arc::new(broker.clone()), 64);

    let orchestrator: Arc<Orchestrator> = Arc::new(OrderOrchestrator::new(
        Arc::new(store.clone()) as Arc<dyn OrderStore>,
        Arc::new(accounts) as Arc<dyn AccountGateway>,
        Arc::new(catalog.clone()) as Arc<dyn CatalogGateway>,
        Arc::new(publisher.clone()) as Arc<dyn EventPublisher>,
    ));
    let verifier: Arc<dyn WebhookVerifier> = Arc::new(HmacWebhookVerifier::new(SECRET).unwrap());
    let payments = PaymentReconciler::new(
        Arc::new(ledger.clone()) as Arc<dyn TransactionStore>,
        orchestrator.clone(),
        verifier,
    );

    let state = Arc::new(AppState {
        orders: orchestrator,
        payments,
    });

    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        store,
        ledger,
        catalog,
        broker,
        publisher,
    }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn cart(account_id: u64) -> Value {
    json!({
        "account_id": account_id,
        "products": [
            {"product_id": "prod-A", "quantity": 2},
            {"product_id": "prod-B", "quantity": 1}
        ]
    })
}

fn webhook_body(order_id: i64, status: &str, settled: i64) -> Vec<u8> {
    json!({
        "type": "payment.updated",
        "data": {
            "customer": {"customer_id": "cus_42", "name": "Ada", "email": "ada@example.com"},
            "product_cart": [{"product_id": "prod-A", "quantity": 2}],
            "payment_id": "pay_123",
            "metadata": {"order_id": order_id, "user_id": 42},
            "total_amount": 2500,
            "settled_amount": settled,
            "currency": "USD",
            "status": status
        }
    })
    .to_string()
    .into_bytes()
}

fn signed_webhook(body: Vec<u8>, secret: &str) -> Request<Body> {
    let timestamp = Utc::now().timestamp();
    let signature = HmacWebhookVerifier::new(secret)
        .unwrap()
        .sign("msg_1", timestamp, &body)
        .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json")
        .header("webhook-id", "msg_1")
        .header("webhook-timestamp", timestamp.to_string())
        .header("webhook-signature", signature)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let t = setup().await;

    let (status, json) = send(&t.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order() {
    let t = setup().await;

    let (status, json) = send(&t.app, json_request("POST", "/orders", &cart(42))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["account_id"], 42);
    assert_eq!(json["total_price"], 2500);
    assert_eq!(json["payment_status"], "pending");
    assert_eq!(json["products"].as_array().unwrap().len(), 2);
    assert_eq!(json["products"][0]["price"], 1000);

    t.publisher.shutdown().await;
    assert_eq!(t.broker.messages_for("interaction_events").await.len(), 2);
}

#[tokio::test]
async fn test_create_order_for_unknown_account() {
    let t = setup().await;

    let (status, json) = send(&t.app, json_request("POST", "/orders", &cart(999))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("999"));
    assert_eq!(t.store.order_count().await, 0);

    t.publisher.shutdown().await;
    assert_eq!(t.broker.message_count().await, 0);
}

#[tokio::test]
async fn test_create_order_with_bad_input() {
    let t = setup().await;

    let zero = json!({"account_id": 42, "products": [{"product_id": "prod-A", "quantity": 0}]});
    let (status, _) = send(&t.app, json_request("POST", "/orders", &zero)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let negative = json!({"account_id": 42, "products": [{"product_id": "prod-A", "quantity": -1}]});
    let (status, json) = send(&t.app, json_request("POST", "/orders", &negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_catalog_outage_is_service_unavailable() {
    let t = setup().await;
    t.catalog.set_unavailable(Some("down")).await;

    let (status, _) = send(&t.app, json_request("POST", "/orders", &cart(42))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_create_and_read_orders() {
    let t = setup().await;
    let (_, created) = send(&t.app, json_request("POST", "/orders", &cart(42))).await;
    let order_id = created["id"].as_i64().unwrap();

    let (status, order) = send(&t.app, get(&format!("/orders/{order_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["id"], order_id);
    assert_eq!(order["products"][1]["name"], "Product prod-B");

    let (status, list) = send(&t.app, get("/accounts/42/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["total_price"], 2500);

    let (status, empty) = send(&t.app, get("/accounts/7/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(empty.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let t = setup().await;

    let (status, json) = send(&t.app, get("/orders/12345")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_update_status() {
    let t = setup().await;
    let (_, created) = send(&t.app, json_request("POST", "/orders", &cart(42))).await;
    let order_id = created["id"].as_i64().unwrap();
    let uri = format!("/orders/{order_id}/status");

    for _ in 0..2 {
        let (status, _) = send(&t.app, json_request("PUT", &uri, &json!({"status": "paid"}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let stored = t.store.get(OrderId::new(order_id)).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::paid());

    let (status, _) = send(
        &t.app,
        json_request("PUT", "/orders/999/status", &json!({"status": "paid"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signed_webhook_marks_order_paid() {
    let t = setup().await;
    let (_, created) = send(&t.app, json_request("POST", "/orders", &cart(42))).await;
    let order_id = created["id"].as_i64().unwrap();

    let (status, json) = send(&t.app, signed_webhook(webhook_body(order_id, "paid", 2500), SECRET)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "paid");
    assert_eq!(json["order_synced"], true);

    let tx = t.ledger.get(OrderId::new(order_id)).await.unwrap().unwrap();
    assert_eq!(tx.settled_price, Money::from_cents(2500));
    let order = t.store.get(OrderId::new(order_id)).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::paid());
}

#[tokio::test]
async fn test_webhook_for_unknown_order_still_succeeds() {
    let t = setup().await;

    let (status, json) = send(&t.app, signed_webhook(webhook_body(77, "paid", 2500), SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order_synced"], false);

    let (status, unsynced) = send(&t.app, get("/payments/unsynced")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unsynced.as_array().unwrap().len(), 1);
    assert_eq!(unsynced[0]["order_id"], 77);
}

#[tokio::test]
async fn test_webhook_with_bad_signature_is_unauthorized() {
    let t = setup().await;

    let (status, json) = send(&t.app, signed_webhook(webhook_body(1, "paid", 2500), "wrong")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());
    assert!(t.ledger.is_empty().await);
}

#[tokio::test]
async fn test_malformed_webhook_is_bad_request() {
    let t = setup().await;

    let (status, _) = send(&t.app, signed_webhook(b"{\"type\": 1}".to_vec(), SECRET)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(t.ledger.is_empty().await);
}

#[tokio::test]
async fn test_checkout_opens_pending_transaction() {
    let t = setup().await;
    let (_, created) = send(&t.app, json_request("POST", "/orders", &cart(42))).await;
    let order_id = created["id"].as_i64().unwrap();
    let checkout = json!({
        "order_id": order_id,
        "customer_id": "cus_42",
        "payment_id": "pay_123",
        "currency": "USD"
    });

    let (status, json) = send(&t.app, json_request("POST", "/payments/checkout", &checkout)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["total_price"], 2500);
    assert_eq!(json["user_id"], 42);

    let (status, _) = send(&t.app, signed_webhook(webhook_body(order_id, "paid", 2500), SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    let tx = t.ledger.get(OrderId::new(order_id)).await.unwrap().unwrap();
    assert_eq!(tx.status, PaymentStatus::paid());
    assert_eq!(tx.payment_id, "pay_123");

    let unknown = json!({"order_id": 999, "customer_id": "c", "payment_id": "p", "currency": "USD"});
    let (status, _) = send(&t.app, json_request("POST", "/payments/checkout", &unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let blank = json!({"order_id": order_id, "customer_id": "c", "payment_id": " ", "currency": "USD"});
    let (status, _) = send(&t.app, json_request("POST", "/payments/checkout", &blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup().await;
    send(&t.app, json_request("POST", "/orders", &cart(42))).await;

    let response = t.app.clone().oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
