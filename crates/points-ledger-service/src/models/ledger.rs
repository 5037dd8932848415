//! 积分账本相关实体定义
//!
//! 余额从不单独存储，始终由账本流水聚合得出

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::EntryType;

/// 积分账本流水（只追加）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub entry_type: EntryType,
    /// 带符号金额：入账为正，提现为负
    pub amount: Decimal,
    /// 入账对应的订单号，或提现自身的订单号
    pub order_number: String,
    pub created_at: DateTime<Utc>,
}

/// 用户余额（派生值）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    /// 当前可用积分 = 全部流水之和
    pub current: Decimal,
    /// 累计提现 = 负向流水绝对值之和
    pub withdrawn: Decimal,
}

impl UserBalance {
    /// 由流水金额聚合余额
    pub fn from_amounts<'a>(amounts: impl IntoIterator<Item = &'a Decimal>) -> Self {
        amounts
            .into_iter()
            .fold(Self::default(), |mut balance, amount| {
                balance.current += *amount;
                if amount.is_sign_negative() {
                    balance.withdrawn += amount.abs();
                }
                balance
            })
    }
}

/// 提现记录（由 WITHDRAWAL 流水投影）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub order_number: String,
    /// 提现金额（正数）
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for Withdrawal {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            order_number: entry.order_number.clone(),
            sum: entry.amount.abs(),
            processed_at: entry.created_at,
        }
    }
}

/// 存储层的提现结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalResult {
    Applied,
    InsufficientFunds,
    DuplicateOrder,
}
