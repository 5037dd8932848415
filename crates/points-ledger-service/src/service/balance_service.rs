//! 余额服务
//!
//! 余额始终由账本流水聚合得出。提现在仓储层按用户串行化执行，
//! 同一用户的并发提现合计超出余额时最多只有一笔成功。

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use points_shared::observability::metrics;

use crate::error::{LedgerError, Result};
use crate::models::{UserBalance, Withdrawal, WithdrawalResult};
use crate::repository::BalanceLedgerRepositoryTrait;
use crate::validation::normalize_order_number;

/// 金额最多保留的小数位（与 NUMERIC(20, 2) 一致）
const AMOUNT_SCALE: u32 = 2;

/// 提现结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    Accepted,
    InsufficientFunds,
    /// 提现订单号格式错误或未通过 Luhn 校验
    InvalidNumber,
    /// 提现订单号已被使用
    DuplicateOrder,
}

impl WithdrawalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidNumber => "invalid_number",
            Self::DuplicateOrder => "duplicate_order",
        }
    }
}

impl From<WithdrawalResult> for WithdrawalOutcome {
    fn from(result: WithdrawalResult) -> Self {
        match result {
            WithdrawalResult::Applied => Self::Accepted,
            WithdrawalResult::InsufficientFunds => Self::InsufficientFunds,
            WithdrawalResult::DuplicateOrder => Self::DuplicateOrder,
        }
    }
}

/// 余额服务
pub struct BalanceService {
    ledger: Arc<dyn BalanceLedgerRepositoryTrait>,
}

impl BalanceService {
    pub fn new(ledger: Arc<dyn BalanceLedgerRepositoryTrait>) -> Self {
        Self { ledger }
    }

    /// 查询余额
    pub async fn get_balance(&self, user_id: &str) -> Result<UserBalance> {
        self.ledger.get_balance(user_id).await
    }

    /// 提现
    ///
    /// 金额必须为正且最多两位小数，否则返回参数错误
    #[instrument(skip(self))]
    pub async fn process_withdrawal(
        &self,
        user_id: &str,
        raw_number: &str,
        sum: Decimal,
    ) -> Result<WithdrawalOutcome> {
        let Some(number) = normalize_order_number(raw_number) else {
            metrics::record_withdrawal(WithdrawalOutcome::InvalidNumber.as_str());
            return Ok(WithdrawalOutcome::InvalidNumber);
        };

        if sum <= Decimal::ZERO {
            return Err(LedgerError::Validation("提现金额必须大于 0".to_string()));
        }
        if sum.normalize().scale() > AMOUNT_SCALE {
            return Err(LedgerError::Validation(
                "提现金额最多保留两位小数".to_string(),
            ));
        }

        let outcome = WithdrawalOutcome::from(self.ledger.withdraw(user_id, number, sum).await?);
        if outcome == WithdrawalOutcome::Accepted {
            info!(order = number, %sum, "提现成功");
        }

        metrics::record_withdrawal(outcome.as_str());
        Ok(outcome)
    }

    /// 提现记录，最近的在前
    pub async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        self.ledger.list_withdrawals(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockBalanceLedgerRepositoryTrait;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn service(repo: MockBalanceLedgerRepositoryTrait) -> BalanceService {
        BalanceService::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn test_invalid_number_short_circuits() {
        let mut repo = MockBalanceLedgerRepositoryTrait::new();
        repo.expect_withdraw().never();

        let outcome = service(repo)
            .process_withdrawal("alice", "12345678901", d("10"))
            .await
            .unwrap();
        assert_eq!(outcome, WithdrawalOutcome::InvalidNumber);
    }

    #[tokio::test]
    async fn test_non_positive_sum_is_rejected() {
        let mut repo = MockBalanceLedgerRepositoryTrait::new();
        repo.expect_withdraw().never();
        let service = service(repo);

        for sum in ["0", "-5"] {
            let err = service
                .process_withdrawal("alice", "2377225624", d(sum))
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_sum_precision_is_limited() {
        let mut repo = MockBalanceLedgerRepositoryTrait::new();
        repo.expect_withdraw().never();

        let err = service(repo)
            .process_withdrawal("alice", "2377225624", d("1.005"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_repository_result_is_mapped() {
        let mut repo = MockBalanceLedgerRepositoryTrait::new();
        repo.expect_withdraw()
            .times(1)
            .returning(|user, number, sum| {
                assert_eq!(user, "alice");
                assert_eq!(number, "2377225624");
                assert_eq!(sum, "751.50".parse::<Decimal>().unwrap());
                Ok(WithdrawalResult::InsufficientFunds)
            });

        let outcome = service(repo)
            .process_withdrawal("alice", "2377225624", d("751.50"))
            .await
            .unwrap();
        assert_eq!(outcome, WithdrawalOutcome::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_get_balance_passthrough() {
        let mut repo = MockBalanceLedgerRepositoryTrait::new();
        repo.expect_get_balance().returning(|_| {
            Ok(UserBalance {
                current: "300".parse().unwrap(),
                withdrawn: "200".parse().unwrap(),
            })
        });

        let balance = service(repo).get_balance("alice").await.unwrap();
        assert_eq!(balance.current, d("300"));
        assert_eq!(balance.withdrawn, d("200"));
    }
}
