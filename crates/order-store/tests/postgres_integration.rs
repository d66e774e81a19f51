//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need Docker. Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use order_store::{
    AccountId, LineItem, Money, NewOrder, OrderId, OrderStore, PaymentStatus,
    PostgresOrderStore, StoreError,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

/// Rejects line items for the product `poison`, so a failure can be forced
/// after the order header has been inserted.
const POISON_TRIGGER: &str = r#"
CREATE OR REPLACE FUNCTION reject_poison() RETURNS trigger AS $$
BEGIN
    IF NEW.product_id = 'poison' THEN
        RAISE EXCEPTION 'poisoned line item';
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS reject_poison ON order_products;
CREATE TRIGGER reject_poison BEFORE INSERT ON order_products
    FOR EACH ROW EXECUTE FUNCTION reject_poison();
"#;

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            sqlx::raw_sql(POISON_TRIGGER)
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_products, orders RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

fn order_for(account: u64, items: &[(&str, u32)]) -> NewOrder {
    NewOrder::new(
        AccountId::new(account),
        Money::from_dollars(25),
        items.iter().map(|(p, q)| LineItem::new(*p, *q)).collect(),
    )
}

async fn count(store: &PostgresOrderStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn put_and_get_by_account() {
    let store = get_test_store().await;
    let id = store
        .put(&order_for(42, &[("prod-A", 2), ("prod-B", 1)]))
        .await
        .unwrap();

    let orders = store.get_by_account(AccountId::new(42)).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, id);
    assert_eq!(orders[0].total_price, Money::from_dollars(25));
    assert_eq!(orders[0].payment_status, PaymentStatus::pending());
    assert_eq!(orders[0].line_items.len(), 2);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn failure_after_header_insert_rolls_back_everything() {
    let store = get_test_store().await;

    let result = store
        .put(&order_for(42, &[("prod-A", 1), ("poison", 1)]))
        .await;
    assert!(matches!(result, Err(StoreError::Database(_))));

    assert_eq!(count(&store, "orders").await, 0);
    assert_eq!(count(&store, "order_products").await, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn orders_without_items_are_returned() {
    let store = get_test_store().await;
    let empty = store.put(&order_for(9, &[])).await.unwrap();
    let full = store.put(&order_for(9, &[("a", 1)])).await.unwrap();

    let orders = store.get_by_account(AccountId::new(9)).await.unwrap();
    let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![empty, full]);
    assert!(orders[0].line_items.is_empty());
    assert_eq!(orders[1].line_items.len(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn update_payment_status_twice_is_a_no_op() {
    let store = get_test_store().await;
    let id = store.put(&order_for(1, &[("a", 1)])).await.unwrap();

    store
        .update_payment_status(id, &PaymentStatus::paid())
        .await
        .unwrap();
    store
        .update_payment_status(id, &PaymentStatus::paid())
        .await
        .unwrap();

    let order = store.get(id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::paid());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn update_payment_status_missing_order() {
    let store = get_test_store().await;
    let result = store
        .update_payment_status(OrderId::new(12345), &PaymentStatus::paid())
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn close_is_idempotent() {
    let store = get_test_store().await;
    store.close().await;
    store.close().await;
    assert!(store.pool().is_closed());
}
