use async_trait::async_trait;
use common::{AccountId, Money, OrderId, PaymentStatus};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    LedgerError, LedgerResult, NewTransaction, PaymentOutcome, Transaction, TransactionStore,
};

const TRANSACTION_COLUMNS: &str = r#"
    order_id, user_id, customer_id, payment_id, total_price, settled_price,
    currency, status, order_synced, version, created_at, updated_at
"#;

/// PostgreSQL-backed transaction ledger.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the payment service migrations, ignoring versions owned by
    /// other services in the same database.
    pub async fn run_migrations(&self) -> LedgerResult<()> {
        let mut migrator = sqlx::migrate!("../../migrations/payments");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await?;
        Ok(())
    }

    fn row_to_transaction(row: PgRow) -> LedgerResult<Transaction> {
        let user_id: i64 = row.try_get("user_id")?;
        let user_id = u64::try_from(user_id)
            .map_err(|_| LedgerError::Validation(format!("stored user id {user_id} is negative")))?;

        Ok(Transaction {
            order_id: OrderId::new(row.try_get("order_id")?),
            user_id: AccountId::new(user_id),
            customer_id: row.try_get("customer_id")?,
            payment_id: row.try_get("payment_id")?,
            total_price: Money::from_cents(row.try_get("total_price")?),
            settled_price: Money::from_cents(row.try_get("settled_price")?),
            currency: row.try_get("currency")?,
            status: PaymentStatus::new(row.try_get::<String, _>("status")?),
            order_synced: row.try_get("order_synced")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn user_id_param(user_id: AccountId) -> LedgerResult<i64> {
    i64::try_from(user_id.value())
        .map_err(|_| LedgerError::Validation(format!("user id {user_id} is out of range")))
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    #[tracing::instrument(skip(self, tx), fields(order_id = %tx.order_id))]
    async fn register(&self, tx: &NewTransaction) -> LedgerResult<Transaction> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (order_id, user_id, customer_id, payment_id, total_price, currency, status, order_synced)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(tx.order_id.value())
        .bind(user_id_param(tx.user_id)?)
        .bind(&tx.customer_id)
        .bind(&tx.payment_id)
        .bind(tx.total_price.cents())
        .bind(&tx.currency)
        .bind(PaymentStatus::PENDING)
        .execute(&self.pool)
        .await?;

        self.get(tx.order_id)
            .await?
            .ok_or(LedgerError::NotFound(tx.order_id))
    }

    #[tracing::instrument(skip(self, outcome), fields(order_id = %outcome.order_id, status = %outcome.status))]
    async fn apply_outcome(&self, outcome: &PaymentOutcome) -> LedgerResult<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO transactions
                (order_id, user_id, customer_id, payment_id, total_price, settled_price,
                 currency, status, order_synced)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
            ON CONFLICT (order_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                customer_id = EXCLUDED.customer_id,
                payment_id = EXCLUDED.payment_id,
                total_price = EXCLUDED.total_price,
                settled_price = EXCLUDED.settled_price,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                order_synced = FALSE,
                version = transactions.version + 1,
                updated_at = NOW()
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(outcome.order_id.value())
            .bind(user_id_param(outcome.user_id)?)
            .bind(&outcome.customer_id)
            .bind(&outcome.payment_id)
            .bind(outcome.total_price.cents())
            .bind(outcome.settled_price.cents())
            .bind(&outcome.currency)
            .bind(outcome.status.as_str())
            .fetch_one(&self.pool)
            .await?;

        Self::row_to_transaction(row)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_synced(&self, order_id: OrderId, version: i64) -> LedgerResult<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET order_synced = TRUE, updated_at = NOW() \
             WHERE order_id = $1 AND version = $2",
        )
        .bind(order_id.value())
        .bind(version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get(order_id).await? {
            Some(_) => Ok(false),
            None => Err(LedgerError::NotFound(order_id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn mark_unsynced(&self, order_id: OrderId) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE transactions SET order_synced = FALSE, updated_at = NOW() WHERE order_id = $1",
        )
        .bind(order_id.value())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(order_id));
        }
        Ok(())
    }

    async fn list_unsynced(&self) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE order_synced = FALSE ORDER BY updated_at, order_id"
        );
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_transaction)
            .collect()
    }

    async fn get(&self, order_id: OrderId) -> LedgerResult<Option<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_id = $1");
        sqlx::query(&sql)
            .bind(order_id.value())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_transaction)
            .transpose()
    }
}
