//! 号源台账
//!
//! 所有写操作都在调用方持有的事务连接上执行。`lock_available` 对医生行加
//! `FOR UPDATE` 行锁，同一医生的并发预约因此串行化；`decrement` 的
//! `WHERE available_slots > 0` 条件在锁内再次校验。

use crate::connection::map_db_error;
use hms_core::ledger::{checked_decrement, ensure_non_negative};
use hms_core::{HmsError, Result};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

/// 读取剩余号源（不加锁）
pub async fn get_available(pool: &PgPool, doctor_id: Uuid) -> Result<i32> {
    let row = sqlx::query("SELECT available_slots FROM doctors WHERE id = $1")
        .bind(doctor_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    match row {
        Some(row) => ensure_non_negative(doctor_id, row.get("available_slots")),
        None => Err(HmsError::NotFound(format!("Doctor {} not found", doctor_id))),
    }
}

/// 锁定医生行并读取剩余号源，锁持有到事务结束
pub async fn lock_available(conn: &mut PgConnection, doctor_id: Uuid) -> Result<i32> {
    let row = sqlx::query("SELECT available_slots FROM doctors WHERE id = $1 FOR UPDATE")
        .bind(doctor_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;

    match row {
        Some(row) => ensure_non_negative(doctor_id, row.get("available_slots")),
        None => Err(HmsError::NotFound(format!("Doctor {} not found", doctor_id))),
    }
}

/// 扣减一个号源，返回扣减后的剩余数量
pub async fn decrement(conn: &mut PgConnection, doctor_id: Uuid) -> Result<i32> {
    let row = sqlx::query(r#"
        UPDATE doctors
        SET available_slots = available_slots - 1
        WHERE id = $1 AND available_slots > 0
        RETURNING available_slots
    "#)
    .bind(doctor_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?;

    match row {
        Some(row) => Ok(row.get("available_slots")),
        None => {
            // 区分医生不存在与号源耗尽
            let remaining = lock_available(conn, doctor_id).await?;
            checked_decrement(doctor_id, remaining)?;
            Err(HmsError::ConflictingWrite(format!(
                "slot ledger for doctor {} changed during decrement",
                doctor_id
            )))
        }
    }
}
