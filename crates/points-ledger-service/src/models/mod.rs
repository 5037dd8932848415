//! 积分服务领域模型
//!
//! 包含订单、账本流水和派生余额的定义

pub mod enums;
pub mod ledger;
pub mod order;

// 重新导出常用类型
pub use enums::{EntryType, OrderStatus};
pub use ledger::{LedgerEntry, UserBalance, Withdrawal, WithdrawalResult};
pub use order::{InsertOutcome, Order};
