//! 积分 API 错误类型定义
//!
//! 业务结果（重复上传、余额不足等）由处理器直接映射为状态码，这里只覆盖请求错误与系统错误

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use points_ledger::LedgerError;
use points_shared::error::PlatformError;
use serde_json::json;

/// 积分 API 错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),

    // 请求错误
    #[error("请求格式错误: {0}")]
    BadRequest(String),
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 系统错误
    #[error("存储错误: {0}")]
    Storage(#[from] LedgerError),
    #[error("基础设施错误: {0}")]
    Platform(#[from] PlatformError),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Storage(LedgerError::OrderNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Storage(e) if e.is_business_error() => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Platform(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(e) => e.error_code(),
            Self::Platform(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn is_system_error(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if self.is_system_error() {
            tracing::error!(error = %self, code = self.error_code(), "请求处理失败");
            "服务内部错误，请稍后重试".to_string()
        } else {
            match &self {
                Self::Storage(LedgerError::Validation(msg)) => msg.clone(),
                other => other.to_string(),
            }
        };

        error_response(status, self.error_code(), &message)
    }
}

/// 统一的错误响应体
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({
        "success": false,
        "code": code,
        "message": message,
        "data": serde_json::Value::Null
    });

    (status, axum::Json(body)).into_response()
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::Storage(LedgerError::Validation("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Storage(LedgerError::Internal("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Platform(PlatformError::Internal("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::Unauthorized("x".into()).error_code(),
            "UNAUTHORIZED"
        );
        assert_eq!(ApiError::BadRequest("x".into()).error_code(), "BAD_REQUEST");
        assert_eq!(
            ApiError::Storage(LedgerError::Internal("x".into())).error_code(),
            "INTERNAL_ERROR"
        );
        assert_eq!(
            ApiError::Platform(PlatformError::Internal("x".into())).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[tokio::test]
    async fn test_system_error_hides_details() {
        let response =
            ApiError::Storage(LedgerError::Internal("connection reset".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert!(!json["message"].as_str().unwrap().contains("connection reset"));
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_validation_message_is_returned() {
        let response =
            ApiError::Storage(LedgerError::Validation("提现金额必须大于 0".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "提现金额必须大于 0");
    }
}
