//! 预约存储
//!
//! 预约插入与号源扣减共享同一个事务。未提交的 `sqlx::Transaction` 在drop时
//! 回滚，任何提前返回都不会留下孤立的预约或多扣的号源。

use crate::connection::map_db_error;
use crate::ledger;
use crate::models::{into_appointments, DbAppointment};
use crate::queries::DatabaseQueries;
use async_trait::async_trait;
use hms_core::ledger::checked_decrement;
use hms_core::models::{Appointment, AppointmentStatus, NewAppointment};
use hms_core::store::AppointmentStore;
use hms_core::{HmsError, Result};
use uuid::Uuid;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, date, status, created_at";

#[async_trait]
impl AppointmentStore for DatabaseQueries {
    async fn available_slots(&self, doctor_id: Uuid) -> Result<i32> {
        ledger::get_available(self.pool.pool(), doctor_id).await
    }

    async fn create_booking(&self, booking: &NewAppointment) -> Result<Appointment> {
        let mut tx = self.pool.pool().begin().await.map_err(map_db_error)?;

        // 1. 锁定医生行并校验剩余号源
        let remaining = ledger::lock_available(&mut *tx, booking.doctor_id).await?;
        checked_decrement(booking.doctor_id, remaining)?;

        // 2. 校验患者存在
        let patient_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM patients WHERE id = $1")
            .bind(booking.patient_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?;
        if patient_exists.is_none() {
            return Err(HmsError::NotFound(format!("Patient {} not found", booking.patient_id)));
        }

        // 3. 插入Pending预约
        let row = sqlx::query_as::<_, DbAppointment>(&format!(
            r#"
            INSERT INTO appointments (id, patient_id, doctor_id, date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.patient_id)
        .bind(booking.doctor_id)
        .bind(booking.date)
        .bind(AppointmentStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        // 4. 扣减号源
        let left = ledger::decrement(&mut *tx, booking.doctor_id).await?;

        tx.commit().await.map_err(map_db_error)?;

        tracing::info!(
            "Booked appointment {} for patient {} with doctor {} ({} slots left)",
            booking.id,
            booking.patient_id,
            booking.doctor_id,
            left
        );
        Appointment::try_from(row)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment> {
        let row = sqlx::query_as::<_, DbAppointment>(&format!(
            "SELECT {} FROM appointments WHERE id = $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        match row {
            Some(row) => Appointment::try_from(row),
            None => Err(HmsError::NotFound(format!("Appointment {} not found", id))),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<Appointment> {
        let row = sqlx::query_as::<_, DbAppointment>(&format!(
            r#"
            UPDATE appointments
            SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(new_status.as_str())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        match row {
            Some(row) => Appointment::try_from(row),
            None => {
                // 预约不存在时返回NotFound，否则状态已被并发修改
                let current = self.get_appointment(id).await?;
                Err(HmsError::ConflictingWrite(format!(
                    "appointment {} is {} (expected {})",
                    id, current.status, expected
                )))
            }
        }
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, DbAppointment>(&format!(
            "SELECT {} FROM appointments WHERE doctor_id = $1 ORDER BY date, created_at",
            APPOINTMENT_COLUMNS
        ))
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        into_appointments(rows)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, DbAppointment>(&format!(
            "SELECT {} FROM appointments WHERE patient_id = $1 ORDER BY date, created_at",
            APPOINTMENT_COLUMNS
        ))
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        into_appointments(rows)
    }
}
