//! 积分服务错误类型
//!
//! 业务结果（重复上传、余额不足等）以枚举返回值表达，这里只定义参数错误和系统错误

use points_shared::error::PlatformError;
use thiserror::Error;

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("基础设施错误: {0}")]
    Platform(#[from] PlatformError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Platform(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::OrderNotFound(_))
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Platform(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
