//! 积分账本仓储
//!
//! 提供积分流水的数据访问，余额始终由流水聚合得出

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::traits::BalanceLedgerRepositoryTrait;
use crate::error::{LedgerError, Result};
use crate::models::{EntryType, LedgerEntry, UserBalance, Withdrawal, WithdrawalResult};

/// 积分账本仓储
///
/// 流水只追加不修改，`(entry_type, order_number)` 唯一约束防止重复入账
pub struct BalanceLedgerRepository {
    pool: PgPool,
}

impl BalanceLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中追加流水
    ///
    /// 返回新记录的 ID
    pub async fn append_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        entry_type: EntryType,
        amount: Decimal,
        order_number: &str,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO balance_ledger (user_id, entry_type, amount, order_number, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(entry_type)
        .bind(amount)
        .bind(order_number)
        .fetch_one(tx)
        .await?;

        Ok(id)
    }

    /// 在事务中聚合余额
    async fn balance_in_tx(tx: &mut PgConnection, user_id: &str) -> Result<UserBalance> {
        let (current, withdrawn): (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS current,
                   COALESCE(SUM(-amount) FILTER (WHERE amount < 0), 0) AS withdrawn
            FROM balance_ledger
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(tx)
        .await?;

        Ok(UserBalance { current, withdrawn })
    }
}

/// 唯一约束冲突
fn is_unique_violation(err: &LedgerError) -> bool {
    match err {
        LedgerError::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl BalanceLedgerRepositoryTrait for BalanceLedgerRepository {
    async fn get_balance(&self, user_id: &str) -> Result<UserBalance> {
        let mut conn = self.pool.acquire().await?;
        Self::balance_in_tx(&mut conn, user_id).await
    }

    #[instrument(skip(self))]
    async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        sum: Decimal,
    ) -> Result<WithdrawalResult> {
        let mut tx = self.pool.begin().await?;

        // 事务级咨询锁，同一用户的提现在多实例间串行执行
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let used: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM balance_ledger
                WHERE entry_type = 'WITHDRAWAL' AND order_number = $1
            )
            "#,
        )
        .bind(order_number)
        .fetch_one(&mut *tx)
        .await?;

        if used {
            tx.rollback().await?;
            return Ok(WithdrawalResult::DuplicateOrder);
        }

        let balance = Self::balance_in_tx(&mut tx, user_id).await?;
        if balance.current < sum {
            debug!(current = %balance.current, %sum, "余额不足");
            tx.rollback().await?;
            return Ok(WithdrawalResult::InsufficientFunds);
        }

        // 其他用户并发使用同一提现订单号时由唯一约束兜底
        match Self::append_in_tx(&mut tx, user_id, EntryType::Withdrawal, -sum, order_number).await
        {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(WithdrawalResult::DuplicateOrder),
            Err(e) => return Err(e),
        }

        tx.commit().await?;
        Ok(WithdrawalResult::Applied)
    }

    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT order_number, -amount AS sum, created_at AS processed_at
            FROM balance_ledger
            WHERE user_id = $1 AND entry_type = 'WITHDRAWAL'
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }

    async fn list_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, entry_type, amount, order_number, created_at
            FROM balance_ledger
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
