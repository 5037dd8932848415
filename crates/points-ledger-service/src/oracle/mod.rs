//! 积分计算系统（外部预言机）客户端
//!
//! 通过 AccrualOracle trait 抽象外部查询，对账 Worker 只依赖该接口，
//! 测试时可注入 mock 实现。

mod http;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

pub use http::HttpAccrualOracle;

/// 积分计算系统给出的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleStatus {
    /// 已登记，尚未开始计算
    Registered,
    /// 计算中
    Processing,
    /// 订单无效，不会产生积分
    Invalid,
    /// 计算完成
    Processed(Decimal),
}

/// 单次查询的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleReply {
    Status(OracleStatus),
    /// 积分计算系统尚不知道该订单
    NotRegistered,
    /// 被限流，在 retry_after 之后才能再次查询
    RateLimited { retry_after: Duration },
}

impl OracleReply {
    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Status(OracleStatus::Registered) => "registered",
            Self::Status(OracleStatus::Processing) => "processing",
            Self::Status(OracleStatus::Invalid) => "invalid",
            Self::Status(OracleStatus::Processed(_)) => "processed",
            Self::NotRegistered => "not_registered",
            Self::RateLimited { .. } => "rate_limited",
        }
    }
}

/// 查询积分计算系统的瞬时错误
///
/// 订单保持原状态，下一轮重试
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("请求积分计算系统超时")]
    Timeout,

    #[error("请求积分计算系统失败: {0}")]
    Request(String),

    #[error("积分计算系统返回异常状态码: {0}")]
    UnexpectedStatus(u16),

    #[error("积分计算系统响应格式错误: {0}")]
    Malformed(String),
}

impl OracleError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout => "ORACLE_TIMEOUT",
            Self::Request(_) => "ORACLE_REQUEST_FAILED",
            Self::UnexpectedStatus(_) => "ORACLE_UNEXPECTED_STATUS",
            Self::Malformed(_) => "ORACLE_MALFORMED_RESPONSE",
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// 积分计算系统客户端抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualOracle: Send + Sync {
    /// 查询单个订单的积分状态
    async fn query(&self, order_number: &str) -> Result<OracleReply, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_labels() {
        assert_eq!(
            OracleReply::Status(OracleStatus::Processed(Decimal::from(5))).label(),
            "processed"
        );
        assert_eq!(OracleReply::NotRegistered.label(), "not_registered");
        assert_eq!(
            OracleReply::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .label(),
            "rate_limited"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OracleError::Timeout.error_code(), "ORACLE_TIMEOUT");
        assert_eq!(
            OracleError::UnexpectedStatus(500).to_string(),
            "积分计算系统返回异常状态码: 500"
        );
    }
}
