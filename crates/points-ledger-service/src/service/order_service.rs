//! 订单上传服务
//!
//! 校验订单号并以“不存在才插入”的方式登记订单。上传成功后订单以 NEW 状态
//! 落库，由对账 Worker 在下一轮轮询中接手，服务本身不直接通知 Worker。

use std::sync::Arc;

use tracing::{info, instrument};

use points_shared::observability::metrics;

use crate::error::Result;
use crate::models::{InsertOutcome, Order};
use crate::repository::OrderRepositoryTrait;
use crate::validation::normalize_order_number;

/// 订单上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 新订单已登记
    Accepted,
    /// 调用方此前已上传过该订单（幂等成功）
    AlreadyOwnedByCaller,
    /// 订单号已被其他用户上传
    OwnedByOther,
    /// 订单号格式错误或未通过 Luhn 校验
    InvalidNumber,
}

impl SubmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyOwnedByCaller => "already_owned",
            Self::OwnedByOther => "owned_by_other",
            Self::InvalidNumber => "invalid_number",
        }
    }
}

/// 订单上传服务
pub struct OrderService {
    orders: Arc<dyn OrderRepositoryTrait>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepositoryTrait>) -> Self {
        Self { orders }
    }

    /// 上传订单号
    ///
    /// 非法订单号不落库；同一用户重复上传返回幂等成功
    #[instrument(skip(self))]
    pub async fn submit(&self, owner_id: &str, raw_number: &str) -> Result<SubmitOutcome> {
        let outcome = match normalize_order_number(raw_number) {
            None => SubmitOutcome::InvalidNumber,
            Some(number) => match self.orders.insert_if_absent(number, owner_id).await? {
                InsertOutcome::Inserted => {
                    info!(order = number, "订单已登记，等待积分计算");
                    SubmitOutcome::Accepted
                }
                InsertOutcome::Existing { owner_id: existing } if existing == owner_id => {
                    SubmitOutcome::AlreadyOwnedByCaller
                }
                InsertOutcome::Existing { .. } => SubmitOutcome::OwnedByOther,
            },
        };

        metrics::record_order_submission(outcome.as_str());
        Ok(outcome)
    }

    /// 用户上传过的订单，最近上传的在前
    pub async fn list_orders(&self, owner_id: &str) -> Result<Vec<Order>> {
        self.orders.list_by_owner(owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::repository::MockOrderRepositoryTrait;

    fn service(repo: MockOrderRepositoryTrait) -> OrderService {
        OrderService::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn test_invalid_number_is_not_persisted() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_insert_if_absent().never();

        let service = service(repo);
        for raw in ["", "   ", "12345678901", "abc", "1234 5678 903"] {
            assert_eq!(
                service.submit("alice", raw).await.unwrap(),
                SubmitOutcome::InvalidNumber,
                "input: {raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_submit_trims_and_inserts() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_insert_if_absent()
            .times(1)
            .returning(|number, owner| {
                assert_eq!(number, "12345678903");
                assert_eq!(owner, "alice");
                Ok(InsertOutcome::Inserted)
            });

        let outcome = service(repo).submit("alice", " 12345678903\n").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_existing_order_ownership() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_insert_if_absent().returning(|_, _| {
            Ok(InsertOutcome::Existing {
                owner_id: "alice".to_string(),
            })
        });

        let service = service(repo);
        assert_eq!(
            service.submit("alice", "12345678903").await.unwrap(),
            SubmitOutcome::AlreadyOwnedByCaller
        );
        assert_eq!(
            service.submit("bob", "12345678903").await.unwrap(),
            SubmitOutcome::OwnedByOther
        );
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_insert_if_absent()
            .returning(|_, _| Err(LedgerError::Database(sqlx::Error::PoolTimedOut)));

        let err = service(repo).submit("alice", "12345678903").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
