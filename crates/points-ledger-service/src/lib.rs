//! 积分账本服务
//!
//! 订单积分入账与状态对账引擎。
//!
//! ## 核心功能
//!
//! - **订单登记**：校验订单号（Luhn），按订单号幂等登记，订单归属不可变更
//! - **状态对账**：后台轮询积分计算系统，以 compare-and-swap 推进订单状态，
//!   每个订单恰好入账一次；收到限流信号时全局退避
//! - **余额与提现**：余额由只追加的账本流水聚合，提现按用户串行化
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `validation`: 订单号校验
//! - `repository`: PostgreSQL 与内存仓储
//! - `service`: 订单与余额服务
//! - `oracle`: 积分计算系统客户端
//! - `reconciler`: 订单状态对账 Worker
//! - `storage`: 存储后端装配

pub mod error;
pub mod models;
pub mod oracle;
pub mod reconciler;
pub mod repository;
pub mod service;
pub mod storage;
pub mod validation;

pub use error::{LedgerError, Result};
pub use models::*;
pub use oracle::{AccrualOracle, HttpAccrualOracle, OracleError, OracleReply, OracleStatus};
pub use reconciler::{BackoffGate, ReconcileOutcome, StatusReconciler, TickReport};
pub use repository::{BalanceLedgerRepository, MemoryStore, OrderRepository};
pub use service::{BalanceService, OrderService, SubmitOutcome, WithdrawalOutcome};
pub use storage::Storage;
