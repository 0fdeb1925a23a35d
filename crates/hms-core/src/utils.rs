//! 通用工具函数

use crate::error::{HmsError, Result};
use chrono::NaiveDate;
use uuid::Uuid;

/// 预约日期格式
pub const APPOINTMENT_DATE_FORMAT: &str = "%Y-%m-%d";

/// 解析预约日期 (YYYY-MM-DD)
///
/// 只做语法校验，不拒绝过去的日期。
pub fn parse_appointment_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(HmsError::Validation("date is required".into()));
    }
    // %Y 接受带符号和超过四位的年份，这里只允许固定的 YYYY-MM-DD
    let bytes = raw.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(HmsError::Validation(format!("invalid date '{}': expected YYYY-MM-DD", raw)));
    }
    NaiveDate::parse_from_str(raw, APPOINTMENT_DATE_FORMAT)
        .map_err(|e| HmsError::Validation(format!("invalid date '{}': {}", raw, e)))
}

/// 必填字段不能为空白
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(HmsError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

/// 将查询串解析为ID，失败时返回None（按姓名查询）
pub fn parse_id_or_name(query: &str) -> Option<Uuid> {
    Uuid::parse_str(query.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_appointment_date() {
        let date = parse_appointment_date("2025-01-01").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        // 过去的日期同样接受
        assert!(parse_appointment_date(" 1999-12-31 ").is_ok());

        assert!(matches!(parse_appointment_date(""), Err(HmsError::Validation(_))));
        assert!(matches!(parse_appointment_date("2025-02-30"), Err(HmsError::Validation(_))));
        assert!(matches!(parse_appointment_date("01/01/2025"), Err(HmsError::Validation(_))));

        // 带符号或超过四位的年份
        assert!(matches!(parse_appointment_date("-5000-01-01"), Err(HmsError::Validation(_))));
        assert!(matches!(parse_appointment_date("+99999-01-01"), Err(HmsError::Validation(_))));
        assert!(matches!(parse_appointment_date("2025-1-01"), Err(HmsError::Validation(_))));
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("name", "Alice").is_ok());
        assert!(require_non_empty("name", "   ").is_err());
    }

    #[test]
    fn test_parse_id_or_name() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id_or_name(&id.to_string()), Some(id));
        assert_eq!(parse_id_or_name("Alice"), None);
    }
}
