//! 请求 DTO 定义

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

/// 提现请求
#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawRequest {
    /// 用于提现的订单号
    #[validate(length(min = 1, message = "订单号不能为空"))]
    pub order: String,
    /// 提现积分
    pub sum: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdraw_request_from_json() {
        let req: WithdrawRequest =
            serde_json::from_str(r#"{"order":"2377225624","sum":751.5}"#).unwrap();
        assert_eq!(req.order, "2377225624");
        assert_eq!(req.sum, "751.5".parse::<Decimal>().unwrap());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_withdraw_request_integer_sum() {
        let req: WithdrawRequest =
            serde_json::from_str(r#"{"order":"2377225624","sum":100}"#).unwrap();
        assert_eq!(req.sum, Decimal::from(100));
    }

    #[test]
    fn test_empty_order_fails_validation() {
        let req: WithdrawRequest = serde_json::from_str(r#"{"order":"","sum":1}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_missing_sum_rejected() {
        assert!(serde_json::from_str::<WithdrawRequest>(r#"{"order":"2377225624"}"#).is_err());
    }
}
