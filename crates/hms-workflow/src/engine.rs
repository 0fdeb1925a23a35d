//! 预约引擎
//!
//! 预约表和号源台账的唯一写入口。每次调用都显式传入 [`CallerContext`]，
//! 权限校验在访问存储之前完成。

use crate::state_machine::AppointmentStateMachine;
use hms_core::store::{AppointmentStore, DirectoryStore};
use hms_core::utils::parse_appointment_date;
use hms_core::{Appointment, AppointmentStatus, CallerContext, Doctor, HmsError, NewAppointment, Result, Role};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 并发冲突时的默认重试次数
pub const DEFAULT_CONFLICT_RETRIES: u32 = 1;

/// 预约请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    /// 患者调用时可省略，默认为本人；管理员调用时必填
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    /// `YYYY-MM-DD`
    pub date: String,
}

/// 预约引擎
pub struct BookingEngine {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn DirectoryStore>,
    state_machine: AppointmentStateMachine,
    conflict_retries: u32,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn AppointmentStore>, directory: Arc<dyn DirectoryStore>) -> Self {
        Self {
            store,
            directory,
            state_machine: AppointmentStateMachine::new(),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn conflict_retries(&self) -> u32 {
        self.conflict_retries
    }

    /// 为患者预约医生的一个号源
    ///
    /// 成功时号源减一并生成一条Pending预约；号源耗尽返回 `CapacityExhausted`，
    /// 且不产生任何修改。
    pub async fn book(&self, caller: &CallerContext, request: BookingRequest) -> Result<Appointment> {
        let patient_id = Self::resolve_patient(caller, request.patient_id)?;
        let date = parse_appointment_date(&request.date)?;
        let booking = NewAppointment::new(patient_id, request.doctor_id, date);

        let appointment = self
            .with_conflict_retry("book", || self.store.create_booking(&booking))
            .await?;

        info!(
            "Appointment {} created by {} for patient {}",
            appointment.id, caller.role, appointment.patient_id
        );
        Ok(appointment)
    }

    /// 推进预约状态，只能由管理员或该预约的医生执行
    pub async fn advance_status(
        &self,
        caller: &CallerContext,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment> {
        caller.ensure_staff()?;

        self.with_conflict_retry("advance_status", || self.try_advance(caller, appointment_id, new_status))
            .await
    }

    async fn try_advance(
        &self,
        caller: &CallerContext,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment> {
        let current = self.store.get_appointment(appointment_id).await?;
        caller.ensure_doctor_scope(current.doctor_id)?;

        let target = self.state_machine.transition(current.status, new_status)?;
        let updated = self.store.update_status(appointment_id, current.status, target).await?;

        info!(
            "Appointment {} moved from {} to {}",
            appointment_id, current.status, updated.status
        );
        Ok(updated)
    }

    /// 医生的预约列表
    pub async fn list_for_doctor(&self, caller: &CallerContext, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        caller.ensure_doctor_scope(doctor_id)?;
        self.directory.find_doctor(doctor_id).await?;
        self.store.list_for_doctor(doctor_id).await
    }

    /// 患者的预约列表
    pub async fn list_for_patient(&self, caller: &CallerContext, patient_id: Uuid) -> Result<Vec<Appointment>> {
        caller.ensure_patient_scope(patient_id)?;
        self.directory.find_patient(patient_id).await?;
        self.store.list_for_patient(patient_id).await
    }

    /// 医生的剩余号源
    pub async fn available_slots(&self, doctor_id: Uuid) -> Result<i32> {
        self.store.available_slots(doctor_id).await
    }

    /// 仍可预约的医生
    pub async fn list_doctors_with_capacity(&self) -> Result<Vec<Doctor>> {
        self.directory.list_doctors_with_capacity().await
    }

    fn resolve_patient(caller: &CallerContext, requested: Option<Uuid>) -> Result<Uuid> {
        match caller.role {
            Role::Patient => {
                let own = caller
                    .user_id
                    .ok_or_else(|| HmsError::Unauthorized("patient identity requires a user id".into()))?;
                match requested {
                    None => Ok(own),
                    Some(id) => {
                        caller.ensure_patient_scope(id)?;
                        Ok(id)
                    }
                }
            }
            Role::Admin => requested
                .ok_or_else(|| HmsError::Validation("patient_id is required".into())),
            Role::Doctor => {
                warn!("Doctor {:?} attempted to book an appointment", caller.user_id);
                Err(HmsError::Forbidden("doctors cannot book appointments".into()))
            }
        }
    }

    async fn with_conflict_retry<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries_left = self.conflict_retries;
        loop {
            match attempt().await {
                Err(err) if err.is_conflict() && retries_left > 0 => {
                    retries_left -= 1;
                    warn!("{} hit a conflicting write, retrying: {}", operation, err);
                }
                result => return result,
            }
        }
    }
}
