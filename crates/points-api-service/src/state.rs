//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use points_ledger::{BalanceService, OrderService, Storage};
use points_shared::cache::Cache;
use std::sync::Arc;

use crate::auth::{JwtManager, SessionLookup};

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub balance: Arc<BalanceService>,
    /// 存储后端，用于就绪探针
    pub storage: Storage,
    pub jwt: JwtManager,
    pub sessions: Arc<dyn SessionLookup>,
    /// Redis 客户端，内存模式下为空
    pub cache: Option<Cache>,
}

impl AppState {
    /// 由装配好的存储创建应用状态
    pub fn new(storage: Storage, jwt: JwtManager, sessions: Arc<dyn SessionLookup>) -> Self {
        Self {
            orders: Arc::new(OrderService::new(storage.orders.clone())),
            balance: Arc::new(BalanceService::new(storage.ledger.clone())),
            storage,
            jwt,
            sessions,
            cache: None,
        }
    }

    /// 附加 Redis 客户端，就绪探针会检查其连通性
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }
}
