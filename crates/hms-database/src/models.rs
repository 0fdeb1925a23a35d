//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use hms_core::models::*;
use hms_core::HmsError;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库医生表
#[derive(Debug, FromRow)]
pub struct DbDoctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub experience: i32,
    pub contact: Option<String>,
    pub available_slots: i32,
}

impl From<DbDoctor> for Doctor {
    fn from(db_doctor: DbDoctor) -> Self {
        Doctor {
            id: db_doctor.id,
            name: db_doctor.name,
            specialization: db_doctor.specialization,
            experience: db_doctor.experience,
            contact: db_doctor.contact,
            available_slots: db_doctor.available_slots,
        }
    }
}

/// 医生表关联账号表
#[derive(Debug, FromRow)]
pub struct DbDoctorListing {
    #[sqlx(flatten)]
    pub doctor: DbDoctor,
    pub username: String,
}

impl From<DbDoctorListing> for DoctorListing {
    fn from(row: DbDoctorListing) -> Self {
        DoctorListing {
            doctor: row.doctor.into(),
            username: row.username,
        }
    }
}

/// 首页医生查询结果
#[derive(Debug, FromRow)]
pub struct DbPublicDoctor {
    pub name: String,
    pub specialization: String,
    pub experience: i32,
}

impl From<DbPublicDoctor> for PublicDoctor {
    fn from(row: DbPublicDoctor) -> Self {
        PublicDoctor {
            name: row.name,
            specialization: row.specialization,
            experience: row.experience,
        }
    }
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub contact: Option<String>,
}

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            name: db_patient.name,
            age: db_patient.age,
            gender: db_patient.gender,
            contact: db_patient.contact,
        }
    }
}

/// 患者表关联账号表
#[derive(Debug, FromRow)]
pub struct DbPatientListing {
    #[sqlx(flatten)]
    pub patient: DbPatient,
    pub username: String,
}

impl From<DbPatientListing> for PatientListing {
    fn from(row: DbPatientListing) -> Self {
        PatientListing {
            patient: row.patient.into(),
            username: row.username,
        }
    }
}

/// 数据库预约表
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub status: String, // 存储为字符串，转换为AppointmentStatus枚举
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbAppointment> for Appointment {
    type Error = HmsError;

    fn try_from(db_appointment: DbAppointment) -> Result<Self, Self::Error> {
        let status = db_appointment.status.parse::<AppointmentStatus>().map_err(|_| {
            HmsError::Database(format!(
                "appointment {} has unknown status '{}'",
                db_appointment.id, db_appointment.status
            ))
        })?;

        Ok(Appointment {
            id: db_appointment.id,
            patient_id: db_appointment.patient_id,
            doctor_id: db_appointment.doctor_id,
            date: db_appointment.date,
            status,
            created_at: db_appointment.created_at,
        })
    }
}

/// 数据库病历表
#[derive(Debug, FromRow)]
pub struct DbMedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub description: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub blob_ref: Option<String>,
}

impl From<DbMedicalRecord> for MedicalRecordMeta {
    fn from(row: DbMedicalRecord) -> Self {
        MedicalRecordMeta {
            id: row.id,
            patient_id: row.patient_id,
            description: row.description,
            upload_date: row.upload_date,
            blob_ref: row.blob_ref,
        }
    }
}

/// 批量转换预约行
pub(crate) fn into_appointments(rows: Vec<DbAppointment>) -> hms_core::Result<Vec<Appointment>> {
    rows.into_iter().map(Appointment::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_appointment(status: &str) -> DbAppointment {
        DbAppointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            status: status.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_appointment_status_conversion() {
        let appointment = Appointment::try_from(db_appointment("Confirmed")).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);

        let err = Appointment::try_from(db_appointment("Cancelled")).unwrap_err();
        assert!(matches!(err, HmsError::Database(_)));
    }

    #[test]
    fn test_doctor_listing_conversion() {
        let row = DbDoctorListing {
            doctor: DbDoctor {
                id: Uuid::nil(),
                name: "Dr. Grey".into(),
                specialization: "Surgery".into(),
                experience: 5,
                contact: Some("555-0100".into()),
                available_slots: 4,
            },
            username: "grey".into(),
        };
        let listing = DoctorListing::from(row);
        assert_eq!(listing.username, "grey");
        assert_eq!(listing.doctor.available_slots, 4);
    }
}
