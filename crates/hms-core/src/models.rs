//! 核心数据模型定义

use crate::error::{HmsError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 医生档案
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,        // 专科
    pub experience: i32,               // 从业年限
    pub contact: Option<String>,
    pub available_slots: i32,          // 剩余可预约号源，只由预约引擎修改
}

/// 管理员视图：医生档案及其登录账号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorListing {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub username: String,
}

/// 首页公开展示的医生信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDoctor {
    pub name: String,
    pub specialization: String,
    pub experience: i32,
}

impl From<&Doctor> for PublicDoctor {
    fn from(doctor: &Doctor) -> Self {
        Self {
            name: doctor.name.clone(),
            specialization: doctor.specialization.clone(),
            experience: doctor.experience,
        }
    }
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub contact: Option<String>,
}

/// 管理员视图：患者信息及其登录账号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientListing {
    #[serde(flatten)]
    pub patient: Patient,
    pub username: String,
}

/// 预约状态
///
/// 只能向前推进：Pending → Confirmed → Completed，或 Pending → Completed。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Pending,   // 待确认
    Confirmed, // 已确认
    Completed, // 已完成
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = HmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(AppointmentStatus::Pending),
            "Confirmed" => Ok(AppointmentStatus::Confirmed),
            "Completed" => Ok(AppointmentStatus::Completed),
            other => Err(HmsError::Validation(format!(
                "unknown appointment status: {}",
                other
            ))),
        }
    }
}

/// 预约信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

/// 新预约插入模型，由预约引擎生成
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

impl NewAppointment {
    pub fn new(patient_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            date,
        }
    }

    /// 生成初始状态为Pending的预约
    pub fn into_appointment(self, created_at: DateTime<Utc>) -> Appointment {
        Appointment {
            id: self.id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            date: self.date,
            status: AppointmentStatus::Pending,
            created_at,
        }
    }
}

/// 新医生档案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialization: String,
    pub experience: i32,
    pub contact: Option<String>,
    pub available_slots: i32,
}

impl NewDoctor {
    pub fn validate(&self) -> Result<()> {
        crate::utils::require_non_empty("name", &self.name)?;
        crate::utils::require_non_empty("specialization", &self.specialization)?;
        if self.experience < 0 {
            return Err(HmsError::Validation("experience must not be negative".into()));
        }
        if self.available_slots < 0 {
            return Err(HmsError::Validation("available_slots must not be negative".into()));
        }
        Ok(())
    }

    pub fn into_doctor(self, id: Uuid) -> Doctor {
        Doctor {
            id,
            name: self.name,
            specialization: self.specialization,
            experience: self.experience,
            contact: self.contact,
            available_slots: self.available_slots,
        }
    }
}

/// 新患者信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub contact: Option<String>,
}

impl NewPatient {
    pub fn validate(&self) -> Result<()> {
        crate::utils::require_non_empty("name", &self.name)?;
        crate::utils::require_non_empty("gender", &self.gender)?;
        if self.age < 0 {
            return Err(HmsError::Validation("age must not be negative".into()));
        }
        Ok(())
    }

    pub fn into_patient(self, id: Uuid) -> Patient {
        Patient {
            id,
            name: self.name,
            age: self.age,
            gender: self.gender,
            contact: self.contact,
        }
    }
}

/// 登录凭据，口令哈希由外部认证服务生成
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub username: String,
    pub password_hash: String,
}

impl AccountCredentials {
    pub fn validate(&self) -> Result<()> {
        crate::utils::require_non_empty("username", &self.username)?;
        crate::utils::require_non_empty("password_hash", &self.password_hash)
    }
}

/// 病历元数据，文件内容存放在外部存储中
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecordMeta {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub description: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub blob_ref: Option<String>,
}

/// 新病历插入模型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedicalRecord {
    pub description: Option<String>,
    pub blob_ref: Option<String>,
}
