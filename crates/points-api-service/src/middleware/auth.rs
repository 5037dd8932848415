//! JWT 认证中间件
//!
//! 验证请求中的 Bearer Token，再向认证网关的会话存储确认会话仍然有效，
//! 通过后将用户身份注入请求扩展

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::{ApiError, error_response};
use crate::state::AppState;

/// 已认证的用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("未登录".to_string()))
    }
}

/// 认证中间件
///
/// 只挂载在 `/api/user` 路由下，健康检查不经过此中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Some(token) => token,
        None => return unauthorized_response("缺少认证 Token"),
    };

    let claims = match state.jwt.verify_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "Token 校验失败");
            return unauthorized_response(&e.to_string());
        }
    };

    match state.sessions.is_session_valid(&claims.user_id).await {
        Ok(true) => {}
        Ok(false) => return unauthorized_response("会话已失效，请重新登录"),
        Err(e) => {
            // 会话存储不可用时拒绝请求，不放行
            warn!(error = %e, user_id = %claims.user_id, "会话查询失败");
            return unauthorized_response("会话校验失败，请稍后重试");
        }
    }

    request.extensions_mut().insert(AuthUser(claims.user_id));
    next.run(request).await
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 生成 401 未授权响应
fn unauthorized_response(message: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}
