//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{InsertOutcome, LedgerEntry, Order, UserBalance, Withdrawal, WithdrawalResult};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 订单号不存在时以 NEW 状态插入，否则返回已有归属（原子操作）
    async fn insert_if_absent(&self, number: &str, owner_id: &str) -> Result<InsertOutcome>;

    async fn get(&self, number: &str) -> Result<Option<Order>>;

    /// 用户的订单，按上传时间倒序
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>>;

    /// 认领一批未终结订单，最久未轮询的优先，并刷新其轮询时间
    async fn claim_pending(&self, limit: i64) -> Result<Vec<Order>>;

    /// NEW → PROCESSING，状态已变化时返回 false
    async fn mark_processing(&self, number: &str) -> Result<bool>;

    /// 非终态 → INVALID，状态已变化时返回 false
    async fn mark_invalid(&self, number: &str) -> Result<bool>;

    /// 非终态 → PROCESSED，并在同一事务中为订单归属用户追加入账流水
    ///
    /// 状态已是终态时不做任何修改并返回 false
    async fn complete_with_accrual(&self, number: &str, accrual: Decimal) -> Result<bool>;
}

/// 积分账本仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceLedgerRepositoryTrait: Send + Sync {
    /// 由流水聚合用户余额
    async fn get_balance(&self, user_id: &str) -> Result<UserBalance>;

    /// 按用户串行化地检查余额并追加提现流水
    async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        sum: Decimal,
    ) -> Result<WithdrawalResult>;

    /// 用户的提现记录，按时间倒序
    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>>;

    /// 用户的全部流水，按时间倒序
    async fn list_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>>;
}
