use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    AccountId, Money, NewOrder, Order, OrderAccumulator, OrderId, OrderRow, PaymentStatus,
    ProductId, Result, StoreError,
    store::{OrderStore, validate_line_items},
};

const SELECT_ORDER_ROWS: &str = r#"
    SELECT o.id, o.account_id, o.created_at, o.total_price, o.payment_status,
           op.product_id, op.quantity
    FROM orders o
    LEFT JOIN order_products op ON op.order_id = o.id
"#;

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the order service migrations.
    ///
    /// Other services share the database with their own migration sets, so
    /// versions applied by them are ignored here.
    pub async fn run_migrations(&self) -> Result<()> {
        let mut migrator = sqlx::migrate!("../../migrations/orders");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order_row(row: PgRow) -> Result<OrderRow> {
        let account_id: i64 = row.try_get("account_id")?;
        let quantity: Option<i32> = row.try_get("quantity")?;
        let quantity = quantity
            .map(|q| {
                u32::try_from(q).map_err(|_| {
                    StoreError::Validation(format!("stored quantity {q} is negative"))
                })
            })
            .transpose()?;

        Ok(OrderRow {
            order_id: OrderId::new(row.try_get("id")?),
            account_id: AccountId::new(account_id as u64),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            total_price: Money::from_cents(row.try_get("total_price")?),
            payment_status: PaymentStatus::new(row.try_get::<String, _>("payment_status")?),
            product_id: row
                .try_get::<Option<String>, _>("product_id")?
                .map(ProductId::new),
            quantity,
        })
    }
}

fn account_id_param(account_id: AccountId) -> Result<i64> {
    i64::try_from(account_id.value())
        .map_err(|_| StoreError::Validation(format!("account id {account_id} is out of range")))
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(account_id = %order.account_id, items = order.line_items.len()))]
    async fn put(&self, order: &NewOrder) -> Result<OrderId> {
        validate_line_items(&order.line_items)?;
        let account_id = account_id_param(order.account_id)?;
        let quantities = order
            .line_items
            .iter()
            .map(|item| {
                i32::try_from(item.quantity).map_err(|_| {
                    StoreError::Validation(format!(
                        "quantity {} for product {} is too large",
                        item.quantity, item.product_id
                    ))
                })
            })
            .collect::<Result<Vec<i32>>>()?;
        let start = Instant::now();

        // The transaction only spans these inserts; dropping it uncommitted rolls back.
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (account_id, total_price, created_at, payment_status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(order.total_price.cents())
        .bind(order.created_at)
        .bind(order.payment_status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for (item, quantity) in order.line_items.iter().zip(quantities) {
            sqlx::query(
                r#"
                INSERT INTO order_products (order_id, product_id, quantity)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(id)
            .bind(item.product_id.as_str())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        metrics::histogram!("order_store_put_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::debug!(order_id = id, "order persisted");
        Ok(OrderId::new(id))
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!("{SELECT_ORDER_ROWS} WHERE o.id = $1 ORDER BY op.product_id");
        let mut rows = sqlx::query(&sql).bind(order_id.value()).fetch(&self.pool);

        let mut acc = OrderAccumulator::new();
        while let Some(row) = rows.try_next().await? {
            acc.push(Self::row_to_order_row(row)?);
        }

        Ok(acc.finish().into_iter().next())
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let start = Instant::now();
        let sql = format!("{SELECT_ORDER_ROWS} WHERE o.account_id = $1 ORDER BY o.id, op.product_id");
        let mut rows = sqlx::query(&sql)
            .bind(account_id_param(account_id)?)
            .fetch(&self.pool);

        let mut acc = OrderAccumulator::new();
        while let Some(row) = rows.try_next().await? {
            acc.push(Self::row_to_order_row(row)?);
        }

        metrics::histogram!("order_store_read_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        Ok(acc.finish())
    }

    #[tracing::instrument(skip(self), fields(status = %status))]
    async fn update_payment_status(
        &self,
        order_id: OrderId,
        status: &PaymentStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET payment_status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(order_id.value())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(order_id));
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            tracing::info!("order store connection pool closed");
        }
    }
}
