//! JWT Token 处理
//!
//! Token 由认证网关签发（HS256），本服务只负责验证；签发方法供运维脚本和测试使用

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// 用户 ID，网关历史版本使用 `UserID` 字段名，且可能为数字
    #[serde(alias = "UserID", deserialize_with = "deserialize_user_id")]
    pub user_id: String,
    /// 过期时间
    pub exp: i64,
}

fn deserialize_user_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawUserId {
        Text(String),
        Number(i64),
    }

    match RawUserId::deserialize(deserializer)? {
        RawUserId::Text(id) => Ok(id),
        RawUserId::Number(id) => Ok(id.to_string()),
    }
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    /// 使用与认证网关共享的密钥创建
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// 生成 JWT Token
    pub fn generate_token(&self, user_id: &str, ttl: Duration) -> Result<String, ApiError> {
        let claims = Claims {
            user_id: user_id.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("JWT 生成失败: {}", e)))
    }

    /// 验证并解析 JWT Token
    ///
    /// 只接受 HS256 签名，`exp` 必须存在且未过期
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token 已过期，请重新登录".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    ApiError::Unauthorized("无效的 Token".to_string())
                }
                _ => ApiError::Unauthorized(format!("Token 验证失败: {}", e)),
            },
        )?;

        if token_data.claims.user_id.is_empty() {
            return Err(ApiError::Unauthorized("Token 缺少用户标识".to_string()));
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_generate_and_verify_token() {
        let manager = JwtManager::new(SECRET);
        let token = manager
            .generate_token("user-42", Duration::minutes(5))
            .unwrap();

        let claims = manager.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, "user-42");
    }

    #[test]
    fn test_invalid_token() {
        let manager = JwtManager::new(SECRET);
        assert!(manager.verify_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_expired_token() {
        let manager = JwtManager::new(SECRET);
        let token = manager
            .generate_token("user-42", Duration::hours(-2))
            .unwrap();

        let err = manager.verify_token(&token).unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
        assert!(err.to_string().contains("过期"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("other-secret")
            .generate_token("user-42", Duration::minutes(5))
            .unwrap();
        assert!(JwtManager::new(SECRET).verify_token(&token).is_err());
    }

    #[test]
    fn test_legacy_numeric_user_id_claim() {
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = encode(
            &Header::default(),
            &json!({ "UserID": 7, "exp": exp }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let claims = JwtManager::new(SECRET).verify_token(&token).unwrap();
        assert_eq!(claims.user_id, "7");
    }

    #[test]
    fn test_missing_exp_rejected() {
        let token = encode(
            &Header::default(),
            &json!({ "user_id": "user-42" }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(JwtManager::new(SECRET).verify_token(&token).is_err());
    }
}
