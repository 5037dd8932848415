//! 余额与提现 API 处理器

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use points_ledger::WithdrawalOutcome;
use validator::Validate;

use crate::{
    dto::{BalanceDto, WithdrawRequest, WithdrawalDto},
    error::{ApiError, error_response},
    middleware::AuthUser,
    state::AppState,
};

/// 查询余额
///
/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<BalanceDto>, ApiError> {
    let balance = state.balance.get_balance(user.id()).await?;
    Ok(Json(balance.into()))
}

/// 提现
///
/// POST /api/user/balance/withdraw
///
/// - 200：提现成功
/// - 400：请求体或金额不合法
/// - 402：余额不足
/// - 422：订单号格式错误或已用于提现
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    req.validate()?;

    let outcome = state
        .balance
        .process_withdrawal(user.id(), &req.order, req.sum)
        .await?;

    let response = match outcome {
        WithdrawalOutcome::Accepted => StatusCode::OK.into_response(),
        WithdrawalOutcome::InsufficientFunds => error_response(
            StatusCode::PAYMENT_REQUIRED,
            "INSUFFICIENT_FUNDS",
            "余额不足",
        ),
        WithdrawalOutcome::InvalidNumber => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_ORDER_NUMBER",
            "订单号格式错误",
        ),
        WithdrawalOutcome::DuplicateOrder => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "DUPLICATE_WITHDRAWAL",
            "该订单号已用于提现",
        ),
    };
    Ok(response)
}

/// 提现记录
///
/// GET /api/user/withdrawals，最近的在前；没有记录时返回 204
pub async fn list_withdrawals(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let withdrawals = state.balance.list_withdrawals(user.id()).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let items: Vec<WithdrawalDto> = withdrawals.into_iter().map(WithdrawalDto::from).collect();
    Ok(Json(items).into_response())
}
