//! 订单仓储
//!
//! 订单状态只通过带前置状态条件的更新推进（compare-and-swap），
//! 并发的对账 Worker 或多个实例不会重复推进同一订单

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::ledger_repo::BalanceLedgerRepository;
use super::traits::OrderRepositoryTrait;
use crate::error::{LedgerError, Result};
use crate::models::{EntryType, InsertOutcome, Order};

/// 订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    #[instrument(skip(self))]
    async fn insert_if_absent(&self, number: &str, owner_id: &str) -> Result<InsertOutcome> {
        let inserted: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (number, owner_id, status, uploaded_at, updated_at)
            VALUES ($1, $2, 'NEW', NOW(), NOW())
            ON CONFLICT (number) DO NOTHING
            RETURNING number
            "#,
        )
        .bind(number)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(InsertOutcome::Inserted);
        }

        // 订单不会被删除，冲突后必然能读到已有归属
        let owner: Option<String> =
            sqlx::query_scalar("SELECT owner_id FROM orders WHERE number = $1")
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;

        owner
            .map(|owner_id| InsertOutcome::Existing { owner_id })
            .ok_or_else(|| LedgerError::OrderNotFound(number.to_string()))
    }

    async fn get(&self, number: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT number, owner_id, status, accrual, uploaded_at, updated_at
            FROM orders
            WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT number, owner_id, status, accrual, uploaded_at, updated_at
            FROM orders
            WHERE owner_id = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<Order>> {
        // SKIP LOCKED 保证多个实例同时认领时拿到互不相交的批次
        let orders = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders SET polled_at = NOW()
            WHERE number IN (
                SELECT number FROM orders
                WHERE status IN ('NEW', 'PROCESSING')
                ORDER BY polled_at NULLS FIRST, uploaded_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING number, owner_id, status, accrual, uploaded_at, updated_at
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(claimed = orders.len(), "认领待对账订单");
        Ok(orders)
    }

    async fn mark_processing(&self, number: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'PROCESSING', updated_at = NOW()
            WHERE number = $1 AND status = 'NEW'
            "#,
        )
        .bind(number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_invalid(&self, number: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'INVALID', updated_at = NOW()
            WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
            "#,
        )
        .bind(number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn complete_with_accrual(&self, number: &str, accrual: Decimal) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE orders SET status = 'PROCESSED', accrual = $2, updated_at = NOW()
            WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
            RETURNING owner_id
            "#,
        )
        .bind(number)
        .bind(accrual)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(owner_id) = owner else {
            tx.rollback().await?;
            return Ok(false);
        };

        BalanceLedgerRepository::append_in_tx(
            &mut tx,
            &owner_id,
            EntryType::Accrual,
            accrual,
            number,
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
