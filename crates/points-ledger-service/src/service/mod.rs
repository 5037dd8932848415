//! 业务服务层
//!
//! - `OrderService`: 订单上传与查询
//! - `BalanceService`: 余额查询与提现

mod balance_service;
mod order_service;

pub use balance_service::{BalanceService, WithdrawalOutcome};
pub use order_service::{OrderService, SubmitOutcome};
