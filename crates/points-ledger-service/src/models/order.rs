//! 订单实体定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::OrderStatus;

/// 用户上传的订单
///
/// 订单号全局唯一，归属用户一经写入不可变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    /// 订单号（通过 Luhn 校验的数字串）
    pub number: String,
    /// 上传该订单的用户
    pub owner_id: String,
    pub status: OrderStatus,
    /// 入账积分，仅 PROCESSED 状态有值
    #[sqlx(default)]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 新上传的订单
    pub fn new(number: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            number: number.into(),
            owner_id: owner_id.into(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: now,
            updated_at: now,
        }
    }

    /// 是否仍需要向积分计算系统查询
    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// 按订单号插入的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// 新建成功
    Inserted,
    /// 订单号已存在，返回已有归属
    Existing { owner_id: String },
}
