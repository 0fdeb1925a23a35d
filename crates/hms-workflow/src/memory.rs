//! 内存存储
//!
//! 所有状态由一把互斥锁保护，每个写操作在一次加锁内完成，
//! 与PostgreSQL事务具有相同的原子性和隔离语义。

use async_trait::async_trait;
use chrono::Utc;
use hms_core::ledger::{checked_decrement, ensure_non_negative};
use hms_core::models::*;
use hms_core::store::{AppointmentStore, DirectoryStore, RecordStore};
use hms_core::utils::parse_id_or_name;
use hms_core::{HmsError, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    doctors: HashMap<Uuid, Doctor>,
    doctor_accounts: HashMap<Uuid, AccountCredentials>,
    patients: HashMap<Uuid, Patient>,
    patient_accounts: HashMap<Uuid, AccountCredentials>,
    admins: HashMap<String, String>, // username -> password_hash
    appointments: Vec<Appointment>,
    records: Vec<MedicalRecordMeta>,
    #[cfg(test)]
    injected_conflicts: u32,
}

impl MemoryState {
    fn doctor_username_taken(&self, username: &str) -> bool {
        self.doctor_accounts.values().any(|a| a.username == username)
    }

    fn patient_username_taken(&self, username: &str) -> bool {
        self.patient_accounts.values().any(|a| a.username == username)
    }

    #[cfg(test)]
    fn take_injected_conflict(&mut self) -> Result<()> {
        if self.injected_conflicts > 0 {
            self.injected_conflicts -= 1;
            return Err(HmsError::ConflictingWrite("injected conflict".into()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn take_injected_conflict(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 内存存储实现
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来的 `n` 次写操作以并发冲突失败
    #[cfg(test)]
    pub(crate) async fn inject_conflicts(&self, n: u32) {
        self.state.lock().await.injected_conflicts = n;
    }

    /// 当前预约总数
    pub async fn appointment_count(&self) -> usize {
        self.state.lock().await.appointments.len()
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
    appointments
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn find_doctor(&self, id: Uuid) -> Result<Doctor> {
        let state = self.state.lock().await;
        state
            .doctors
            .get(&id)
            .cloned()
            .ok_or_else(|| HmsError::NotFound(format!("Doctor {} not found", id)))
    }

    async fn find_patient(&self, id: Uuid) -> Result<Patient> {
        let state = self.state.lock().await;
        state
            .patients
            .get(&id)
            .cloned()
            .ok_or_else(|| HmsError::NotFound(format!("Patient {} not found", id)))
    }

    async fn list_doctors_with_capacity(&self) -> Result<Vec<Doctor>> {
        let state = self.state.lock().await;
        let mut doctors: Vec<Doctor> = state
            .doctors
            .values()
            .filter(|d| d.available_slots > 0)
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    async fn list_doctors(&self) -> Result<Vec<DoctorListing>> {
        let state = self.state.lock().await;
        let mut listings: Vec<DoctorListing> = state
            .doctors
            .values()
            .filter_map(|doctor| {
                state.doctor_accounts.get(&doctor.id).map(|account| DoctorListing {
                    doctor: doctor.clone(),
                    username: account.username.clone(),
                })
            })
            .collect();
        listings.sort_by(|a, b| a.doctor.name.cmp(&b.doctor.name));
        Ok(listings)
    }

    async fn list_patients(&self) -> Result<Vec<PatientListing>> {
        let state = self.state.lock().await;
        let mut listings: Vec<PatientListing> = state
            .patients
            .values()
            .filter_map(|patient| {
                state.patient_accounts.get(&patient.id).map(|account| PatientListing {
                    patient: patient.clone(),
                    username: account.username.clone(),
                })
            })
            .collect();
        listings.sort_by(|a, b| a.patient.name.cmp(&b.patient.name));
        Ok(listings)
    }

    async fn list_public_doctors(&self) -> Result<Vec<PublicDoctor>> {
        let state = self.state.lock().await;
        let mut doctors: Vec<PublicDoctor> = state.doctors.values().map(PublicDoctor::from).collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    async fn search_patient(&self, query: &str) -> Result<Option<Patient>> {
        let state = self.state.lock().await;
        if let Some(patient) = parse_id_or_name(query).and_then(|id| state.patients.get(&id)) {
            return Ok(Some(patient.clone()));
        }
        let name = query.trim();
        let mut matches: Vec<&Patient> = state.patients.values().filter(|p| p.name == name).collect();
        matches.sort_by_key(|p| p.id);
        Ok(matches.first().map(|p| (*p).clone()))
    }

    async fn register_doctor(&self, doctor: NewDoctor, credentials: AccountCredentials) -> Result<Doctor> {
        doctor.validate()?;
        credentials.validate()?;

        let mut state = self.state.lock().await;
        if state.doctor_username_taken(&credentials.username) {
            return Err(HmsError::AlreadyExists(format!("Username {} already exists", credentials.username)));
        }

        let doctor = doctor.into_doctor(Uuid::new_v4());
        state.doctor_accounts.insert(doctor.id, credentials);
        state.doctors.insert(doctor.id, doctor.clone());

        tracing::info!("Registered doctor {}", doctor.id);
        Ok(doctor)
    }

    async fn register_patient(&self, patient: NewPatient, credentials: AccountCredentials) -> Result<Patient> {
        patient.validate()?;
        credentials.validate()?;

        let mut state = self.state.lock().await;
        if state.patient_username_taken(&credentials.username) {
            return Err(HmsError::AlreadyExists(format!("Username {} already exists", credentials.username)));
        }

        let patient = patient.into_patient(Uuid::new_v4());
        state.patient_accounts.insert(patient.id, credentials);
        state.patients.insert(patient.id, patient.clone());

        tracing::info!("Registered patient {}", patient.id);
        Ok(patient)
    }

    async fn ensure_admin(&self, credentials: &AccountCredentials) -> Result<bool> {
        credentials.validate()?;

        let mut state = self.state.lock().await;
        if state.admins.contains_key(&credentials.username) {
            return Ok(false);
        }
        state
            .admins
            .insert(credentials.username.clone(), credentials.password_hash.clone());
        tracing::info!("Created admin account '{}'", credentials.username);
        Ok(true)
    }

    async fn change_admin_password(&self, credentials: &AccountCredentials) -> Result<()> {
        credentials.validate()?;

        let mut state = self.state.lock().await;
        match state.admins.get_mut(&credentials.username) {
            Some(hash) => {
                *hash = credentials.password_hash.clone();
                tracing::info!("Password updated for admin '{}'", credentials.username);
                Ok(())
            }
            None => Err(HmsError::NotFound(format!("Admin {} not found", credentials.username))),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list_records(&self, patient_id: Uuid) -> Result<Vec<MedicalRecordMeta>> {
        let state = self.state.lock().await;
        let mut records: Vec<MedicalRecordMeta> = state
            .records
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(records)
    }

    async fn add_record(&self, patient_id: Uuid, record: NewMedicalRecord) -> Result<MedicalRecordMeta> {
        let mut state = self.state.lock().await;
        if !state.patients.contains_key(&patient_id) {
            return Err(HmsError::NotFound(format!("Patient {} not found", patient_id)));
        }

        let meta = MedicalRecordMeta {
            id: Uuid::new_v4(),
            patient_id,
            description: record.description,
            upload_date: Utc::now(),
            blob_ref: record.blob_ref,
        };
        state.records.push(meta.clone());

        tracing::info!("Added medical record {} for patient {}", meta.id, patient_id);
        Ok(meta)
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn available_slots(&self, doctor_id: Uuid) -> Result<i32> {
        let state = self.state.lock().await;
        match state.doctors.get(&doctor_id) {
            Some(doctor) => ensure_non_negative(doctor_id, doctor.available_slots),
            None => Err(HmsError::NotFound(format!("Doctor {} not found", doctor_id))),
        }
    }

    async fn create_booking(&self, booking: &NewAppointment) -> Result<Appointment> {
        let mut state = self.state.lock().await;
        state.take_injected_conflict()?;

        // 先完成所有校验，再一次性写入
        let remaining = match state.doctors.get(&booking.doctor_id) {
            Some(doctor) => doctor.available_slots,
            None => return Err(HmsError::NotFound(format!("Doctor {} not found", booking.doctor_id))),
        };
        let left = checked_decrement(booking.doctor_id, remaining)?;
        if !state.patients.contains_key(&booking.patient_id) {
            return Err(HmsError::NotFound(format!("Patient {} not found", booking.patient_id)));
        }

        let appointment = booking.clone().into_appointment(Utc::now());
        state.appointments.push(appointment.clone());
        if let Some(doctor) = state.doctors.get_mut(&booking.doctor_id) {
            doctor.available_slots = left;
        }

        tracing::info!(
            "Booked appointment {} for patient {} with doctor {} ({} slots left)",
            appointment.id,
            appointment.patient_id,
            appointment.doctor_id,
            left
        );
        Ok(appointment)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment> {
        let state = self.state.lock().await;
        state
            .appointments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| HmsError::NotFound(format!("Appointment {} not found", id)))
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<Appointment> {
        let mut state = self.state.lock().await;
        state.take_injected_conflict()?;

        let appointment = state
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| HmsError::NotFound(format!("Appointment {} not found", id)))?;

        if appointment.status != expected {
            return Err(HmsError::ConflictingWrite(format!(
                "appointment {} is {} (expected {})",
                id, appointment.status, expected
            )));
        }

        appointment.status = new_status;
        Ok(appointment.clone())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        let state = self.state.lock().await;
        Ok(sorted(
            state
                .appointments
                .iter()
                .filter(|a| a.doctor_id == doctor_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        let state = self.state.lock().await;
        Ok(sorted(
            state
                .appointments
                .iter()
                .filter(|a| a.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn credentials(username: &str) -> AccountCredentials {
        AccountCredentials {
            username: username.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn new_doctor(slots: i32) -> NewDoctor {
        NewDoctor {
            name: "Dr. Memory".into(),
            specialization: "Neurology".into(),
            experience: 3,
            contact: None,
            available_slots: slots,
        }
    }

    fn new_patient(name: &str) -> NewPatient {
        NewPatient {
            name: name.into(),
            age: 30,
            gender: "M".into(),
            contact: Some("555-0101".into()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_usernames_rejected() {
        let store = InMemoryStore::new();
        store.register_doctor(new_doctor(1), credentials("house")).await.unwrap();

        let err = store.register_doctor(new_doctor(1), credentials("house")).await.unwrap_err();
        assert!(matches!(err, HmsError::AlreadyExists(_)));
        assert_eq!(store.list_doctors().await.unwrap().len(), 1);

        // 医生和患者账号分属不同的表
        assert!(store.register_patient(new_patient("House"), credentials("house")).await.is_ok());
    }

    #[tokio::test]
    async fn test_capacity_listing_and_search() {
        let store = InMemoryStore::new();
        let busy = store.register_doctor(new_doctor(0), credentials("busy")).await.unwrap();
        let free = store.register_doctor(new_doctor(2), credentials("free")).await.unwrap();
        let alice = store.register_patient(new_patient("Alice"), credentials("alice")).await.unwrap();

        let available: Vec<Uuid> = store
            .list_doctors_with_capacity()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(available, vec![free.id]);
        assert!(!available.contains(&busy.id));

        assert_eq!(store.search_patient("Alice").await.unwrap(), Some(alice.clone()));
        assert_eq!(store.search_patient(&alice.id.to_string()).await.unwrap(), Some(alice));
        assert_eq!(store.search_patient("Bob").await.unwrap(), None);
        assert_eq!(store.list_public_doctors().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_booking_rejected_without_side_effects() {
        let store = InMemoryStore::new();
        let doctor = store.register_doctor(new_doctor(1), credentials("doc")).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let err = store
            .create_booking(&NewAppointment::new(Uuid::new_v4(), doctor.id, date))
            .await
            .unwrap_err();
        assert!(matches!(err, HmsError::NotFound(_)));
        assert_eq!(store.available_slots(doctor.id).await.unwrap(), 1);
        assert_eq!(store.appointment_count().await, 0);
    }

    #[tokio::test]
    async fn test_records_newest_first() {
        let store = InMemoryStore::new();
        let patient = store.register_patient(new_patient("Carol"), credentials("carol")).await.unwrap();

        let first = store
            .add_record(patient.id, NewMedicalRecord { description: Some("x-ray".into()), blob_ref: None })
            .await
            .unwrap();
        let second = store
            .add_record(patient.id, NewMedicalRecord { description: Some("mri".into()), blob_ref: None })
            .await
            .unwrap();

        let records = store.list_records(patient.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].upload_date >= records[1].upload_date);
        assert!(records.iter().any(|r| r.id == first.id));
        assert!(records.iter().any(|r| r.id == second.id));

        assert!(store
            .add_record(Uuid::new_v4(), NewMedicalRecord { description: None, blob_ref: None })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_admin_accounts() {
        let store = InMemoryStore::new();
        assert!(store.ensure_admin(&credentials("admin")).await.unwrap());
        assert!(!store.ensure_admin(&credentials("admin")).await.unwrap());

        let updated = AccountCredentials {
            username: "admin".into(),
            password_hash: "new-hash".into(),
        };
        assert!(store.change_admin_password(&updated).await.is_ok());
        assert!(matches!(
            store.change_admin_password(&credentials("root")).await,
            Err(HmsError::NotFound(_))
        ));
    }
}
