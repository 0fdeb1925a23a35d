//! PostgreSQL预约集成测试
//!
//! 需要设置 `HMS_TEST_DATABASE_URL`，未设置时测试直接跳过。

use chrono::NaiveDate;
use hms_core::models::*;
use hms_core::store::{AppointmentStore, DirectoryStore, RecordStore};
use hms_core::HmsError;
use hms_database::{DatabasePool, DatabaseQueries, PoolSettings};
use std::sync::Arc;
use uuid::Uuid;

async fn setup() -> Option<DatabaseQueries> {
    let url = match std::env::var("HMS_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("HMS_TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };

    let settings = PoolSettings {
        url,
        max_connections: 5,
        min_connections: 1,
        ..PoolSettings::default()
    };
    let pool = DatabasePool::connect(&settings).await.expect("connect");
    pool.ping().await.expect("ping");
    let store = DatabaseQueries::new(pool);
    store.create_tables().await.expect("create tables");
    Some(store)
}

fn credentials(prefix: &str) -> AccountCredentials {
    AccountCredentials {
        username: format!("{}-{}", prefix, Uuid::new_v4().simple()),
        password_hash: "pbkdf2:sha256:test".to_string(),
    }
}

async fn doctor_with_slots(store: &DatabaseQueries, slots: i32) -> Doctor {
    store
        .register_doctor(
            NewDoctor {
                name: "Dr. Integration".into(),
                specialization: "Cardiology".into(),
                experience: 10,
                contact: None,
                available_slots: slots,
            },
            credentials("doc"),
        )
        .await
        .expect("register doctor")
}

async fn patient(store: &DatabaseQueries, name: &str) -> Patient {
    store
        .register_patient(
            NewPatient {
                name: name.into(),
                age: 40,
                gender: "F".into(),
                contact: None,
            },
            credentials("pat"),
        )
        .await
        .expect("register patient")
}

fn new_year() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

#[tokio::test]
async fn test_booking_decrements_until_exhausted() {
    let Some(store) = setup().await else { return };
    let doctor = doctor_with_slots(&store, 2).await;
    let a = patient(&store, "Patient A").await;
    let b = patient(&store, "Patient B").await;
    let c = patient(&store, "Patient C").await;

    store.create_booking(&NewAppointment::new(a.id, doctor.id, new_year())).await.unwrap();
    assert_eq!(store.available_slots(doctor.id).await.unwrap(), 1);

    store.create_booking(&NewAppointment::new(b.id, doctor.id, new_year())).await.unwrap();
    assert_eq!(store.available_slots(doctor.id).await.unwrap(), 0);

    let err = store
        .create_booking(&NewAppointment::new(c.id, doctor.id, new_year()))
        .await
        .unwrap_err();
    assert!(matches!(err, HmsError::CapacityExhausted(id) if id == doctor.id));
    assert_eq!(store.available_slots(doctor.id).await.unwrap(), 0);
    assert_eq!(store.list_for_doctor(doctor.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_booking_leaves_no_trace() {
    let Some(store) = setup().await else { return };
    let doctor = doctor_with_slots(&store, 1).await;

    let err = store
        .create_booking(&NewAppointment::new(Uuid::new_v4(), doctor.id, new_year()))
        .await
        .unwrap_err();
    assert!(matches!(err, HmsError::NotFound(_)));
    assert_eq!(store.available_slots(doctor.id).await.unwrap(), 1);
    assert!(store.list_for_doctor(doctor.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_after_insert_rolls_back() {
    let Some(store) = setup().await else { return };
    let doctor = doctor_with_slots(&store, 1).await;
    let p = patient(&store, "Rollback Patient").await;
    let pool = store.pool().pool();

    // 预约行已写入后，扣减号源的UPDATE失败
    let suffix = doctor.id.simple().to_string();
    let function = format!("hms_fail_decrement_{}", suffix);
    let trigger = format!("hms_fail_decrement_trg_{}", suffix);
    sqlx::query(&format!(
        "CREATE FUNCTION {function}() RETURNS trigger AS $$ \
         BEGIN IF NEW.id = '{id}' THEN RAISE EXCEPTION 'decrement blocked'; END IF; RETURN NEW; END; \
         $$ LANGUAGE plpgsql",
        function = function,
        id = doctor.id
    ))
    .execute(pool)
    .await
    .expect("create function");
    sqlx::query(&format!(
        "CREATE TRIGGER {} BEFORE UPDATE ON doctors FOR EACH ROW EXECUTE FUNCTION {}()",
        trigger, function
    ))
    .execute(pool)
    .await
    .expect("create trigger");

    let result = store
        .create_booking(&NewAppointment::new(p.id, doctor.id, new_year()))
        .await;

    sqlx::query(&format!("DROP TRIGGER {} ON doctors", trigger))
        .execute(pool)
        .await
        .expect("drop trigger");
    sqlx::query(&format!("DROP FUNCTION {}()", function))
        .execute(pool)
        .await
        .expect("drop function");

    assert!(matches!(result, Err(HmsError::Database(_))));
    assert_eq!(store.available_slots(doctor.id).await.unwrap(), 1);
    assert!(store.list_for_doctor(doctor.id).await.unwrap().is_empty());
    assert!(store.list_for_patient(p.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listings_are_scoped() {
    let Some(store) = setup().await else { return };
    let doctor = doctor_with_slots(&store, 5).await;
    let other_doctor = doctor_with_slots(&store, 5).await;
    let alice = patient(&store, "Alice Scoped").await;
    let bob = patient(&store, "Bob Scoped").await;

    store.create_booking(&NewAppointment::new(alice.id, doctor.id, new_year())).await.unwrap();
    store.create_booking(&NewAppointment::new(bob.id, doctor.id, new_year())).await.unwrap();
    store.create_booking(&NewAppointment::new(bob.id, other_doctor.id, new_year())).await.unwrap();

    let for_alice = store.list_for_patient(alice.id).await.unwrap();
    assert_eq!(for_alice.len(), 1);
    assert!(for_alice.iter().all(|a| a.patient_id == alice.id));

    let for_bob = store.list_for_patient(bob.id).await.unwrap();
    assert_eq!(for_bob.len(), 2);
    assert!(for_bob.iter().all(|a| a.patient_id == bob.id));

    let for_doctor = store.list_for_doctor(doctor.id).await.unwrap();
    assert_eq!(for_doctor.len(), 2);
    assert!(for_doctor.iter().all(|a| a.doctor_id == doctor.id));

    let for_other = store.list_for_doctor(other_doctor.id).await.unwrap();
    assert_eq!(for_other.len(), 1);
    assert_eq!(for_other[0].patient_id, bob.id);
}

#[tokio::test]
async fn test_search_patient_duplicate_names_picks_lowest_id() {
    let Some(store) = setup().await else { return };
    let name = format!("Twin {}", Uuid::new_v4().simple());
    let first = patient(&store, &name).await;
    let second = patient(&store, &name).await;

    let found = store.search_patient(&name).await.unwrap().expect("patient by name");
    assert_eq!(found.id, first.id.min(second.id));

    let by_id = store.search_patient(&second.id.to_string()).await.unwrap().expect("patient by id");
    assert_eq!(by_id.id, second.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_last_slot() {
    let Some(store) = setup().await else { return };
    let store = Arc::new(store);
    let doctor = doctor_with_slots(&store, 1).await;
    let a = patient(&store, "Racer A").await.id;
    let b = patient(&store, "Racer B").await.id;
    let doctor_id = doctor.id;

    let first = {
        let store = store.clone();
        tokio::spawn(async move { store.create_booking(&NewAppointment::new(a, doctor_id, new_year())).await })
    };
    let second = {
        let store = store.clone();
        tokio::spawn(async move { store.create_booking(&NewAppointment::new(b, doctor_id, new_year())).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Err(HmsError::CapacityExhausted(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(exhausted, 1);
    assert_eq!(store.available_slots(doctor.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_status_compare_and_set() {
    let Some(store) = setup().await else { return };
    let doctor = doctor_with_slots(&store, 1).await;
    let p = patient(&store, "Status Patient").await;
    let appointment = store
        .create_booking(&NewAppointment::new(p.id, doctor.id, new_year()))
        .await
        .unwrap();

    let updated = store
        .update_status(appointment.id, AppointmentStatus::Pending, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::Confirmed);

    // 期望状态已过期
    let err = store
        .update_status(appointment.id, AppointmentStatus::Pending, AppointmentStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, HmsError::ConflictingWrite(_)));

    let err = store
        .update_status(Uuid::new_v4(), AppointmentStatus::Pending, AppointmentStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, HmsError::NotFound(_)));
}

#[tokio::test]
async fn test_duplicate_username_rolls_back_profile() {
    let Some(store) = setup().await else { return };
    let creds = credentials("dup");
    let first = NewPatient {
        name: format!("Dup {}", Uuid::new_v4()),
        age: 30,
        gender: "M".into(),
        contact: None,
    };
    store.register_patient(first.clone(), creds.clone()).await.unwrap();

    let second = NewPatient {
        name: format!("Dup {}", Uuid::new_v4()),
        ..first
    };
    let err = store.register_patient(second.clone(), creds).await.unwrap_err();
    assert!(matches!(err, HmsError::AlreadyExists(_)));
    assert!(store.search_patient(&second.name).await.unwrap().is_none());
}

#[tokio::test]
async fn test_medical_records() {
    let Some(store) = setup().await else { return };
    let p = patient(&store, "Record Patient").await;

    store
        .add_record(
            p.id,
            NewMedicalRecord {
                description: Some("Blood panel".into()),
                blob_ref: Some("s3://records/blood.pdf".into()),
            },
        )
        .await
        .unwrap();

    let records = store.list_records(p.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].patient_id, p.id);

    let err = store
        .add_record(Uuid::new_v4(), NewMedicalRecord { description: None, blob_ref: None })
        .await
        .unwrap_err();
    assert!(matches!(err, HmsError::NotFound(_)));
}
