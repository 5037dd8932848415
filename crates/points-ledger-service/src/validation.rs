//! 订单号校验
//!
//! 订单号是不超过 64 位的非空数字串，并且必须通过 Luhn（模 10）校验。

/// 订单号最大长度，与 `orders.number`、`balance_ledger.order_number` 列宽一致
pub const MAX_ORDER_NUMBER_LEN: usize = 64;

/// Luhn 校验
///
/// 非数字字符或空串直接判定为不合法
pub fn is_valid_luhn(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

/// 规范化并校验订单号
///
/// 去掉首尾空白后校验，合法时返回规范化后的订单号
pub fn normalize_order_number(raw: &str) -> Option<&str> {
    let number = raw.trim();
    (number.len() <= MAX_ORDER_NUMBER_LEN && is_valid_luhn(number)).then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_numbers() {
        assert!(is_valid_luhn("12345678903"));
        assert!(is_valid_luhn("79927398713"));
        assert!(is_valid_luhn("0"));
        assert!(is_valid_luhn("4561261212345467"));
    }

    #[test]
    fn test_invalid_checksum() {
        assert!(!is_valid_luhn("12345678901"));
        assert!(!is_valid_luhn("79927398710"));
        assert!(!is_valid_luhn("4561261212345464"));
    }

    #[test]
    fn test_non_digit_input() {
        assert!(!is_valid_luhn(""));
        assert!(!is_valid_luhn("1234-5678-903"));
        assert!(!is_valid_luhn("abc"));
        assert!(!is_valid_luhn("-12345678903"));
        assert!(!is_valid_luhn("１２３"));
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize_order_number("  12345678903\n"), Some("12345678903"));
        assert_eq!(normalize_order_number("   "), None);
        assert_eq!(normalize_order_number("12345 678903"), None);
    }

    #[test]
    fn test_normalize_rejects_overlong_numbers() {
        let longest = "0".repeat(MAX_ORDER_NUMBER_LEN);
        let too_long = "0".repeat(MAX_ORDER_NUMBER_LEN + 1);
        assert!(is_valid_luhn(&too_long));

        assert_eq!(normalize_order_number(&longest), Some(longest.as_str()));
        assert_eq!(normalize_order_number(&too_long), None);
    }
}
