use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    NewPurchase, OrderId, Page, PaymentStatus, Purchase, PurchaseId, Result, UserId,
    store::PurchaseLedger,
};

const PURCHASE_COLUMNS: &str =
    "id, order_id, user_id, payment_status, total_amount, transaction_date, details";

/// PostgreSQL-backed purchase ledger.
#[derive(Clone)]
pub struct PostgresPurchaseLedger {
    pool: PgPool,
}

impl PostgresPurchaseLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url` and runs the migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let ledger = Self::new(pool);
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_purchase(row: PgRow) -> Result<Purchase> {
        let status: String = row.try_get("payment_status")?;
        let total: Decimal = row.try_get("total_amount")?;
        let transaction_date: DateTime<Utc> = row.try_get("transaction_date")?;

        Ok(Purchase {
            id: PurchaseId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            payment_status: status.parse()?,
            total_amount: Money::from_decimal(total),
            transaction_date,
            details: row.try_get("details")?,
        })
    }

    fn rows_to_purchases(rows: Vec<PgRow>) -> Result<Vec<Purchase>> {
        rows.into_iter().map(Self::row_to_purchase).collect()
    }
}

#[async_trait]
impl PurchaseLedger for PostgresPurchaseLedger {
    #[tracing::instrument(skip(self, purchase), fields(order_id = %purchase.order_id, user_id = %purchase.user_id))]
    async fn save(&self, purchase: NewPurchase) -> Result<Purchase> {
        // Read back the stored row so the caller sees what was persisted.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO purchases (order_id, user_id, payment_status, total_amount, transaction_date, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(purchase.order_id.as_i64())
        .bind(purchase.user_id.as_uuid())
        .bind(purchase.payment_status.as_str())
        .bind(purchase.total_amount.amount())
        .bind(purchase.transaction_date)
        .bind(purchase.details.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let stored = Self::row_to_purchase(row)?;
        metrics::counter!("ledger_purchases_written").increment(1);
        Ok(stored)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: PurchaseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM purchases WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        metrics::counter!("ledger_purchases_deleted").increment(result.rows_affected());
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_for_order(&self, order_id: OrderId, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM purchases WHERE order_id = $1 AND user_id = $2")
            .bind(order_id.as_i64())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        metrics::counter!("ledger_purchases_deleted").increment(result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn get(&self, id: PurchaseId) -> Result<Option<Purchase>> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_purchase).transpose()
    }

    async fn find_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE user_id = $1
            ORDER BY transaction_date DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_purchases(rows)
    }

    async fn count_by_user(&self, user_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_purchases(rows)
    }

    async fn find_by_status(&self, status: PaymentStatus, page: Page) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE payment_status = $1
            ORDER BY transaction_date DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status.as_str())
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_purchases(rows)
    }

    async fn count_by_status(&self, status: PaymentStatus) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM purchases WHERE payment_status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}
