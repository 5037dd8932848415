//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router, middleware,
    routing::{get, post},
};
use points_shared::observability::middleware::{http_tracing, request_id};

use crate::{handlers, middleware::auth_middleware, state::AppState};

/// 构建用户积分路由（需要认证）
fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/orders",
            post(handlers::orders::submit_order).get(handlers::orders::list_orders),
        )
        .route("/balance", get(handlers::balance::get_balance))
        .route("/balance/withdraw", post(handlers::balance::withdraw))
        .route("/withdrawals", get(handlers::balance::list_withdrawals))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// 构建健康检查路由（公开）
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
}

/// 构建完整的 API 路由
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/user", user_routes(&state))
        .merge(health_routes())
        .layer(middleware::from_fn(http_tracing))
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}
