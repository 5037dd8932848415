//! 存储后端装配
//!
//! 根据 `storage.backend` 选择 PostgreSQL 或内存实现，两个二进制共用。

use std::sync::Arc;

use tracing::{info, warn};

use points_shared::config::{AppConfig, StorageBackend};
use points_shared::database::Database;

use crate::error::Result;
use crate::repository::{
    BalanceLedgerRepository, BalanceLedgerRepositoryTrait, MIGRATOR, MemoryStore,
    OrderRepository, OrderRepositoryTrait,
};

/// 装配好的仓储
#[derive(Clone)]
pub struct Storage {
    pub orders: Arc<dyn OrderRepositoryTrait>,
    pub ledger: Arc<dyn BalanceLedgerRepositoryTrait>,
    /// PostgreSQL 后端时持有连接池，用于健康检查与关闭
    pub database: Option<Database>,
}

impl Storage {
    /// 按配置连接存储，PostgreSQL 后端会按需执行内嵌迁移
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Postgres => {
                let db = Database::connect(&config.database).await?;
                if config.database.run_migrations {
                    db.run_migrations(&MIGRATOR).await?;
                }
                info!("PostgreSQL storage ready");

                Ok(Self {
                    orders: Arc::new(OrderRepository::new(db.pool().clone())),
                    ledger: Arc::new(BalanceLedgerRepository::new(db.pool().clone())),
                    database: Some(db),
                })
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage, data is lost on restart");
                Ok(Self::memory(MemoryStore::new()))
            }
        }
    }

    /// 基于内存存储装配
    pub fn memory(store: MemoryStore) -> Self {
        Self {
            orders: Arc::new(store.clone()),
            ledger: Arc::new(store),
            database: None,
        }
    }

    /// 存储健康检查
    pub async fn health_check(&self) -> Result<()> {
        if let Some(db) = &self.database {
            db.health_check().await?;
        }
        Ok(())
    }

    /// 关闭连接池
    pub async fn close(&self) {
        if let Some(db) = &self.database {
            db.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_shares_state() {
        let storage = Storage::memory(MemoryStore::new());
        storage
            .orders
            .insert_if_absent("12345678903", "alice")
            .await
            .unwrap();
        storage
            .orders
            .complete_with_accrual("12345678903", "42".parse().unwrap())
            .await
            .unwrap();

        let balance = storage.ledger.get_balance("alice").await.unwrap();
        assert_eq!(balance.current, "42".parse::<rust_decimal::Decimal>().unwrap());
        storage.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_backend_from_config() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;

        let storage = Storage::connect(&config).await.unwrap();
        assert!(storage.database.is_none());
    }
}
