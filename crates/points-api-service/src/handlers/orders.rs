//! 订单 API 处理器
//!
//! 用户上传订单号并查询订单的积分计算进度

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use points_ledger::SubmitOutcome;
use tracing::debug;

use crate::{
    dto::OrderDto,
    error::{ApiError, error_response},
    middleware::AuthUser,
    state::AppState,
};

/// 上传订单号
///
/// POST /api/user/orders，请求体为纯文本订单号
///
/// - 202：新订单已受理
/// - 200：该用户此前已上传过此订单
/// - 409：订单已被其他用户上传
/// - 422：订单号格式错误
pub async fn submit_order(
    State(state): State<AppState>,
    user: AuthUser,
    body: String,
) -> Result<Response, ApiError> {
    let number = body.trim();
    if number.is_empty() {
        return Err(ApiError::BadRequest("请求体中缺少订单号".to_string()));
    }

    let outcome = state.orders.submit(user.id(), number).await?;
    debug!(user_id = user.id(), order = number, outcome = outcome.as_str(), "订单上传");

    let response = match outcome {
        SubmitOutcome::Accepted => StatusCode::ACCEPTED.into_response(),
        SubmitOutcome::AlreadyOwnedByCaller => StatusCode::OK.into_response(),
        SubmitOutcome::OwnedByOther => error_response(
            StatusCode::CONFLICT,
            "ORDER_OWNED_BY_OTHER",
            "订单已被其他用户上传",
        ),
        SubmitOutcome::InvalidNumber => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_ORDER_NUMBER",
            "订单号格式错误",
        ),
    };
    Ok(response)
}

/// 查询用户上传的订单
///
/// GET /api/user/orders，最近上传的在前；没有订单时返回 204
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let orders = state.orders.list_orders(user.id()).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let items: Vec<OrderDto> = orders.into_iter().map(OrderDto::from).collect();
    Ok(Json(items).into_response())
}
