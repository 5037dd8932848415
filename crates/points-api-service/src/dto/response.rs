//! 响应 DTO 定义
//!
//! 字段名沿用现有前端约定的 snake_case，时间统一为 RFC 3339

use chrono::{DateTime, SecondsFormat, Utc};
use points_ledger::{Order, OrderStatus, UserBalance, Withdrawal};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

fn rfc3339<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// 订单列表项
#[derive(Debug, Serialize)]
pub struct OrderDto {
    pub number: String,
    pub status: OrderStatus,
    /// 仅 PROCESSED 订单返回
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    #[serde(serialize_with = "rfc3339")]
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderDto {
    fn from(order: Order) -> Self {
        Self {
            accrual: order.accrual.filter(|_| order.status == OrderStatus::Processed),
            number: order.number,
            status: order.status,
            uploaded_at: order.uploaded_at,
        }
    }
}

/// 余额
#[derive(Debug, Serialize)]
pub struct BalanceDto {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

impl From<UserBalance> for BalanceDto {
    fn from(balance: UserBalance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

/// 提现记录
#[derive(Debug, Serialize)]
pub struct WithdrawalDto {
    pub order: String,
    pub sum: Decimal,
    #[serde(serialize_with = "rfc3339")]
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalDto {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order_number,
            sum: withdrawal.sum,
            processed_at: withdrawal.processed_at,
        }
    }
}
