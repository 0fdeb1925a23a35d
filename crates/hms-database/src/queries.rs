//! 数据库查询操作

use crate::connection::{map_db_error, DatabasePool};
use crate::models::*;
use async_trait::async_trait;
use hms_core::models::*;
use hms_core::store::{DirectoryStore, RecordStore};
use hms_core::utils::parse_id_or_name;
use hms_core::{HmsError, Result};
use uuid::Uuid;

/// PostgreSQL存储实现
#[derive(Debug, Clone)]
pub struct DatabaseQueries {
    pub(crate) pool: DatabasePool,
}

impl DatabaseQueries {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 医生表，号源计数不允许为负
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS doctors (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                specialization VARCHAR(255) NOT NULL,
                experience INTEGER NOT NULL CHECK (experience >= 0),
                contact VARCHAR(255),
                available_slots INTEGER NOT NULL CHECK (available_slots >= 0),
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(map_db_error)?;

        // 患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                age INTEGER NOT NULL CHECK (age >= 0),
                gender VARCHAR(32) NOT NULL,
                contact VARCHAR(255),
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(map_db_error)?;

        // 管理员账号
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS admins (
                id UUID PRIMARY KEY,
                username VARCHAR(64) UNIQUE NOT NULL,
                password_hash TEXT NOT NULL
            )
        "#).execute(pool).await.map_err(map_db_error)?;

        // 医生登录账号
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS doctor_accounts (
                doctor_id UUID PRIMARY KEY REFERENCES doctors(id),
                username VARCHAR(64) UNIQUE NOT NULL,
                password_hash TEXT NOT NULL
            )
        "#).execute(pool).await.map_err(map_db_error)?;

        // 患者登录账号
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patient_accounts (
                patient_id UUID PRIMARY KEY REFERENCES patients(id),
                username VARCHAR(64) UNIQUE NOT NULL,
                password_hash TEXT NOT NULL
            )
        "#).execute(pool).await.map_err(map_db_error)?;

        // 病历元数据
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS medical_records (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id),
                description TEXT,
                blob_ref VARCHAR(512),
                upload_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(map_db_error)?;

        // 预约表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id),
                doctor_id UUID NOT NULL REFERENCES doctors(id),
                date DATE NOT NULL,
                status VARCHAR(16) NOT NULL DEFAULT 'Pending'
                    CHECK (status IN ('Pending', 'Confirmed', 'Completed')),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(map_db_error)?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_doctors_available_slots ON doctors(available_slots)",
            "CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name)",
            "CREATE INDEX IF NOT EXISTS idx_medical_records_patient_id ON medical_records(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_doctor_id ON appointments(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments(patient_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(map_db_error)?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for DatabaseQueries {
    async fn find_doctor(&self, id: Uuid) -> Result<Doctor> {
        let result = sqlx::query_as::<_, DbDoctor>(
            "SELECT id, name, specialization, experience, contact, available_slots FROM doctors WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        result
            .map(Doctor::from)
            .ok_or_else(|| HmsError::NotFound(format!("Doctor {} not found", id)))
    }

    async fn find_patient(&self, id: Uuid) -> Result<Patient> {
        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT id, name, age, gender, contact FROM patients WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        result
            .map(Patient::from)
            .ok_or_else(|| HmsError::NotFound(format!("Patient {} not found", id)))
    }

    async fn list_doctors_with_capacity(&self) -> Result<Vec<Doctor>> {
        let results = sqlx::query_as::<_, DbDoctor>(r#"
            SELECT id, name, specialization, experience, contact, available_slots
            FROM doctors
            WHERE available_slots > 0
            ORDER BY name
        "#)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Doctor::from).collect())
    }

    async fn list_doctors(&self) -> Result<Vec<DoctorListing>> {
        let results = sqlx::query_as::<_, DbDoctorListing>(r#"
            SELECT d.id, d.name, d.specialization, d.experience, d.contact, d.available_slots, a.username
            FROM doctors d
            JOIN doctor_accounts a ON d.id = a.doctor_id
            ORDER BY d.name
        "#)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(DoctorListing::from).collect())
    }

    async fn list_patients(&self) -> Result<Vec<PatientListing>> {
        let results = sqlx::query_as::<_, DbPatientListing>(r#"
            SELECT p.id, p.name, p.age, p.gender, p.contact, a.username
            FROM patients p
            JOIN patient_accounts a ON p.id = a.patient_id
            ORDER BY p.name
        "#)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(PatientListing::from).collect())
    }

    async fn list_public_doctors(&self) -> Result<Vec<PublicDoctor>> {
        let results = sqlx::query_as::<_, DbPublicDoctor>(
            "SELECT name, specialization, experience FROM doctors ORDER BY name"
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(PublicDoctor::from).collect())
    }

    async fn search_patient(&self, query: &str) -> Result<Option<Patient>> {
        let result = sqlx::query_as::<_, DbPatient>(r#"
            SELECT id, name, age, gender, contact
            FROM patients
            WHERE id = $1 OR name = $2
            ORDER BY (id = $1) DESC, name, id
            LIMIT 1
        "#)
        .bind(parse_id_or_name(query))
        .bind(query.trim())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Patient::from))
    }

    async fn register_doctor(&self, doctor: NewDoctor, credentials: AccountCredentials) -> Result<Doctor> {
        doctor.validate()?;
        credentials.validate()?;

        let id = Uuid::new_v4();
        let mut tx = self.pool.pool().begin().await.map_err(map_db_error)?;

        sqlx::query(r#"
            INSERT INTO doctors (id, name, specialization, experience, contact, available_slots)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#)
        .bind(id)
        .bind(&doctor.name)
        .bind(&doctor.specialization)
        .bind(doctor.experience)
        .bind(&doctor.contact)
        .bind(doctor.available_slots)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query(r#"
            INSERT INTO doctor_accounts (doctor_id, username, password_hash)
            VALUES ($1, $2, $3)
        "#)
        .bind(id)
        .bind(&credentials.username)
        .bind(&credentials.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_db_error(e) {
            HmsError::AlreadyExists(_) => {
                HmsError::AlreadyExists(format!("Username {} already exists", credentials.username))
            }
            other => other,
        })?;

        tx.commit().await.map_err(map_db_error)?;

        tracing::info!("Registered doctor {} ({})", id, credentials.username);
        Ok(doctor.into_doctor(id))
    }

    async fn register_patient(&self, patient: NewPatient, credentials: AccountCredentials) -> Result<Patient> {
        patient.validate()?;
        credentials.validate()?;

        let id = Uuid::new_v4();
        let mut tx = self.pool.pool().begin().await.map_err(map_db_error)?;

        sqlx::query(r#"
            INSERT INTO patients (id, name, age, gender, contact)
            VALUES ($1, $2, $3, $4, $5)
        "#)
        .bind(id)
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(&patient.contact)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query(r#"
            INSERT INTO patient_accounts (patient_id, username, password_hash)
            VALUES ($1, $2, $3)
        "#)
        .bind(id)
        .bind(&credentials.username)
        .bind(&credentials.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_db_error(e) {
            HmsError::AlreadyExists(_) => {
                HmsError::AlreadyExists(format!("Username {} already exists", credentials.username))
            }
            other => other,
        })?;

        tx.commit().await.map_err(map_db_error)?;

        tracing::info!("Registered patient {} ({})", id, credentials.username);
        Ok(patient.into_patient(id))
    }

    async fn ensure_admin(&self, credentials: &AccountCredentials) -> Result<bool> {
        credentials.validate()?;

        let result = sqlx::query(r#"
            INSERT INTO admins (id, username, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
        "#)
        .bind(Uuid::new_v4())
        .bind(&credentials.username)
        .bind(&credentials.password_hash)
        .execute(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        let created = result.rows_affected() == 1;
        if created {
            tracing::info!("Created admin account '{}'", credentials.username);
        }
        Ok(created)
    }

    async fn change_admin_password(&self, credentials: &AccountCredentials) -> Result<()> {
        credentials.validate()?;

        let result = sqlx::query("UPDATE admins SET password_hash = $2 WHERE username = $1")
            .bind(&credentials.username)
            .bind(&credentials.password_hash)
            .execute(self.pool.pool())
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(HmsError::NotFound(format!("Admin {} not found", credentials.username)));
        }

        tracing::info!("Password updated for admin '{}'", credentials.username);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for DatabaseQueries {
    async fn list_records(&self, patient_id: Uuid) -> Result<Vec<MedicalRecordMeta>> {
        let results = sqlx::query_as::<_, DbMedicalRecord>(r#"
            SELECT id, patient_id, description, upload_date, blob_ref
            FROM medical_records
            WHERE patient_id = $1
            ORDER BY upload_date DESC
        "#)
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(MedicalRecordMeta::from).collect())
    }

    async fn add_record(&self, patient_id: Uuid, record: NewMedicalRecord) -> Result<MedicalRecordMeta> {
        let row = sqlx::query_as::<_, DbMedicalRecord>(r#"
            INSERT INTO medical_records (id, patient_id, description, blob_ref)
            VALUES ($1, $2, $3, $4)
            RETURNING id, patient_id, description, upload_date, blob_ref
        "#)
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(&record.description)
        .bind(&record.blob_ref)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match map_db_error(e) {
            HmsError::NotFound(_) => HmsError::NotFound(format!("Patient {} not found", patient_id)),
            other => other,
        })?;

        tracing::info!("Added medical record {} for patient {}", row.id, patient_id);
        Ok(row.into())
    }
}
