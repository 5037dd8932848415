//! 数据库仓储层
//!
//! 提供订单与积分账本的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 状态推进使用带前置条件的更新，入账与状态变更在同一事务中完成
//! - 定义 trait 接口以支持 mock 测试和内存实现

mod ledger_repo;
mod memory;
mod order_repo;
mod traits;

pub use ledger_repo::BalanceLedgerRepository;
pub use memory::MemoryStore;
pub use order_repo::OrderRepository;
pub use traits::*;

/// 内嵌的数据库迁移脚本
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
