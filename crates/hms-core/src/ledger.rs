//! 号源台账规则
//!
//! 每位医生的剩余号源是一个非负计数器。各存储实现在自己的原子单元内
//! 读取当前值后调用这里的规则，保证所有后端的扣减语义一致。

use crate::error::{HmsError, Result};
use uuid::Uuid;

/// 扣减一个号源，返回扣减后的剩余数量
pub fn checked_decrement(doctor_id: Uuid, remaining: i32) -> Result<i32> {
    if remaining <= 0 {
        return Err(HmsError::CapacityExhausted(doctor_id));
    }
    Ok(remaining - 1)
}

/// 读取到的号源值必须非负
pub fn ensure_non_negative(doctor_id: Uuid, remaining: i32) -> Result<i32> {
    if remaining < 0 {
        tracing::error!("Slot ledger for doctor {} is negative: {}", doctor_id, remaining);
        return Err(HmsError::Internal(format!(
            "slot ledger for doctor {} is corrupted",
            doctor_id
        )));
    }
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_decrement() {
        let doctor = Uuid::new_v4();
        assert_eq!(checked_decrement(doctor, 2).unwrap(), 1);
        assert_eq!(checked_decrement(doctor, 1).unwrap(), 0);
        assert!(matches!(checked_decrement(doctor, 0), Err(HmsError::CapacityExhausted(id)) if id == doctor));
        assert!(checked_decrement(doctor, -1).is_err());
    }

    #[test]
    fn test_ensure_non_negative() {
        assert_eq!(ensure_non_negative(Uuid::nil(), 0).unwrap(), 0);
        assert!(matches!(ensure_non_negative(Uuid::nil(), -1), Err(HmsError::Internal(_))));
    }
}
