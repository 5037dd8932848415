//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

const SERVICE_NAME: &str = "points-api";

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

/// 就绪探针：检查存储和 Redis 连接是否可用
///
/// 任一依赖不可用时返回 503，使负载均衡摘除该实例
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let storage_ok = state.storage.health_check().await.is_ok();
    let cache_ok = match &state.cache {
        Some(cache) => Some(cache.health_check().await.is_ok()),
        None => None,
    };
    let all_ok = storage_ok && cache_ok.unwrap_or(true);

    let check = |ok: bool| if ok { "ok" } else { "fail" };
    let body = json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "service": SERVICE_NAME,
        "checks": {
            "storage": check(storage_ok),
            "redis": cache_ok.map(check).unwrap_or("disabled")
        }
    });

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
