//! 会话查询
//!
//! 会话由认证网关写入 Redis，本服务只读

use async_trait::async_trait;
use points_shared::cache::{Cache, CacheKey};
use points_shared::error::PlatformError;

/// 会话有效性查询
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionLookup: Send + Sync {
    /// 用户会话是否仍然有效
    async fn is_session_valid(&self, user_id: &str) -> Result<bool, PlatformError>;
}

/// 基于 Redis 的会话查询，键为 `{prefix}:{user_id}`
pub struct RedisSessionLookup {
    cache: Cache,
    key_prefix: String,
}

impl RedisSessionLookup {
    pub fn new(cache: Cache, key_prefix: impl Into<String>) -> Self {
        Self {
            cache,
            key_prefix: key_prefix.into(),
        }
    }
}

#[async_trait]
impl SessionLookup for RedisSessionLookup {
    async fn is_session_valid(&self, user_id: &str) -> Result<bool, PlatformError> {
        self.cache
            .exists(&CacheKey::session(&self.key_prefix, user_id))
            .await
    }
}

/// 不校验会话，仅用于内存存储的本地开发模式
pub struct AllowAllSessions;

#[async_trait]
impl SessionLookup for AllowAllSessions {
    async fn is_session_valid(&self, _user_id: &str) -> Result<bool, PlatformError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use points_shared::test_utils::test_redis_config;
    use std::time::Duration;

    #[tokio::test]
    async fn test_allow_all_sessions() {
        assert!(AllowAllSessions.is_session_valid("anyone").await.unwrap());
    }

    #[tokio::test]
    #[ignore] // 需要 Redis
    async fn test_redis_session_lookup() {
        let cache = Cache::new(&test_redis_config()).unwrap();
        let lookup = RedisSessionLookup::new(cache.clone(), "test-session");

        let user_id = points_shared::test_utils::test_user_id();
        assert!(!lookup.is_session_valid(&user_id).await.unwrap());

        let key = CacheKey::session("test-session", &user_id);
        cache
            .set(&key, &"token", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(lookup.is_session_valid(&user_id).await.unwrap());

        cache.delete(&key).await.unwrap();
    }
}
