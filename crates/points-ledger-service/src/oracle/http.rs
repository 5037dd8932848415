//! 基于 HTTP 的积分计算系统客户端
//!
//! 接口约定：`GET {base_url}/api/orders/{number}`
//!
//! - 200：JSON `{ "order", "status", "accrual"? }`
//! - 204 / 404：订单未登记
//! - 429：限流，`Retry-After` 为秒数，缺失时使用默认退避，超过上限时按上限截断
//! - 其他状态码：瞬时错误

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use points_shared::config::AccrualConfig;

use super::{AccrualOracle, OracleError, OracleReply, OracleStatus};

/// 积分计算系统的响应体
#[derive(Debug, Deserialize)]
struct AccrualResponse {
    status: String,
    #[serde(default)]
    accrual: Option<Decimal>,
}

impl AccrualResponse {
    fn into_status(self) -> Result<OracleStatus, OracleError> {
        match self.status.as_str() {
            "REGISTERED" => Ok(OracleStatus::Registered),
            "PROCESSING" => Ok(OracleStatus::Processing),
            "INVALID" => Ok(OracleStatus::Invalid),
            "PROCESSED" => {
                let accrual = self.accrual.unwrap_or(Decimal::ZERO);
                if accrual < Decimal::ZERO {
                    return Err(OracleError::Malformed(format!("负数积分: {accrual}")));
                }
                Ok(OracleStatus::Processed(accrual))
            }
            other => Err(OracleError::Malformed(format!("未知状态: {other}"))),
        }
    }
}

/// HTTP 积分计算系统客户端
#[derive(Clone)]
pub struct HttpAccrualOracle {
    client: reqwest::Client,
    base_url: String,
    default_retry_after: Duration,
    max_retry_after: Duration,
}

impl HttpAccrualOracle {
    /// 创建客户端，每次请求受 `request_timeout_ms` 约束
    pub fn new(config: &AccrualConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OracleError::Request(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_retry_after: config.default_retry_after(),
            max_retry_after: config.max_retry_after(),
        })
    }

    fn order_url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, order_number)
    }

    /// 解析 Retry-After 秒数，缺失或无法解析时使用默认值，超出上限时截断
    fn retry_after(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
            .min(self.max_retry_after)
    }
}

#[async_trait]
impl AccrualOracle for HttpAccrualOracle {
    #[instrument(skip(self))]
    async fn query(&self, order_number: &str) -> Result<OracleReply, OracleError> {
        let response = self.client.get(self.order_url(order_number)).send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), "积分计算系统响应");

        match status {
            StatusCode::OK => {
                let body: AccrualResponse = response.json().await?;
                Ok(OracleReply::Status(body.into_status()?))
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(OracleReply::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => Ok(OracleReply::RateLimited {
                retry_after: self.retry_after(response.headers()),
            }),
            other => Err(OracleError::UnexpectedStatus(other.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<OracleStatus, OracleError> {
        serde_json::from_str::<AccrualResponse>(json)
            .unwrap()
            .into_status()
    }

    #[test]
    fn test_parse_statuses() {
        assert_eq!(
            parse(r#"{"order":"12345678903","status":"REGISTERED"}"#).unwrap(),
            OracleStatus::Registered
        );
        assert_eq!(
            parse(r#"{"order":"12345678903","status":"PROCESSING"}"#).unwrap(),
            OracleStatus::Processing
        );
        assert_eq!(
            parse(r#"{"order":"12345678903","status":"INVALID"}"#).unwrap(),
            OracleStatus::Invalid
        );
        assert_eq!(
            parse(r#"{"order":"12345678903","status":"PROCESSED","accrual":729.98}"#).unwrap(),
            OracleStatus::Processed("729.98".parse().unwrap())
        );
    }

    #[test]
    fn test_processed_without_accrual_is_zero() {
        assert_eq!(
            parse(r#"{"order":"12345678903","status":"PROCESSED"}"#).unwrap(),
            OracleStatus::Processed(Decimal::ZERO)
        );
    }

    #[test]
    fn test_negative_accrual_is_malformed() {
        assert!(matches!(
            parse(r#"{"order":"12345678903","status":"PROCESSED","accrual":-5}"#),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_status_is_malformed() {
        assert!(matches!(
            parse(r#"{"order":"12345678903","status":"DONE"}"#),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_retry_after_is_capped() {
        let oracle = HttpAccrualOracle::new(&AccrualConfig {
            max_retry_after_secs: 600,
            ..Default::default()
        })
        .unwrap();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(RETRY_AFTER, "18446744073709551615".parse().unwrap());
        assert_eq!(oracle.retry_after(&headers), Duration::from_secs(600));

        headers.insert(RETRY_AFTER, "120".parse().unwrap());
        assert_eq!(oracle.retry_after(&headers), Duration::from_secs(120));

        headers.insert(RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(oracle.retry_after(&headers), Duration::from_secs(60));
    }

    #[test]
    fn test_order_url_trims_trailing_slash() {
        let oracle = HttpAccrualOracle::new(&AccrualConfig {
            base_url: "http://accrual:8080/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            oracle.order_url("12345678903"),
            "http://accrual:8080/api/orders/12345678903"
        );
    }
}
