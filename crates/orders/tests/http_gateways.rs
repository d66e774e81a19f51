//! HTTP gateways against a local fake of the account and catalog services.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use common::{AccountId, Money, ProductId};
use orders::{
    AccountGateway, CatalogGateway, GatewayError, HttpAccountGateway, HttpCatalogGateway,
    ProductQuery,
};
use serde_json::json;

async fn account(Path(id): Path<u64>) -> impl IntoResponse {
    match id {
        42 => (
            StatusCode::OK,
            Json(json!({"id": 42, "name": "Ada", "email": "ada@example.com"})),
        ),
        500 => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))),
        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))),
    }
}

async fn products(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let catalog = [
        json!({"id": "prod-A", "name": "A", "description": "first", "price": 10.0}),
        json!({"id": "prod-B", "name": "B", "description": "second", "price": 5.25}),
    ];
    let wanted: Vec<String> = params
        .get("ids")
        .map(|ids| ids.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let found: Vec<_> = catalog
        .into_iter()
        .filter(|p| wanted.is_empty() || wanted.iter().any(|id| p["id"] == id.as_str()))
        .collect();
    Json(found)
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!([]))
}

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/accounts/{id}", get(account))
        .route("/products", get(products))
        .route("/slow/products", get(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn account_found_and_missing() {
    let addr = serve().await;
    let gateway = HttpAccountGateway::new(format!("http://{addr}/"), Duration::from_secs(2)).unwrap();

    let account = gateway.get_account(AccountId::new(42)).await.unwrap();
    assert_eq!(account.id, AccountId::new(42));
    assert_eq!(account.email, "ada@example.com");

    assert!(matches!(
        gateway.get_account(AccountId::new(999)).await,
        Err(GatewayError::NotFound)
    ));
    assert!(matches!(
        gateway.get_account(AccountId::new(500)).await,
        Err(GatewayError::Unavailable(_))
    ));
}

#[tokio::test]
async fn catalog_batches_ids_and_converts_prices() {
    let addr = serve().await;
    let gateway = HttpCatalogGateway::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();

    let products = gateway
        .get_products(&ProductQuery::by_ids([
            ProductId::new("prod-B"),
            ProductId::new("ghost"),
        ]))
        .await
        .unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, ProductId::new("prod-B"));
    assert_eq!(products[0].price, Money::from_cents(525));
}

#[tokio::test]
async fn catalog_timeout_is_reported() {
    let addr = serve().await;
    let gateway =
        HttpCatalogGateway::new(format!("http://{addr}/slow"), Duration::from_millis(100)).unwrap();

    let result = gateway.get_products(&ProductQuery::default()).await;
    assert!(matches!(result, Err(GatewayError::Timeout(_))));
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpAccountGateway::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
    let result = gateway.get_account(AccountId::new(1)).await;
    assert!(matches!(result, Err(GatewayError::Unavailable(_))));
}
