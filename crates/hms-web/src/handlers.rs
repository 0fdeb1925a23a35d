//! HTTP处理器

use crate::auth::Caller;
use crate::error::{ApiResult, JsonBody};
use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use hms_core::{
    AccountCredentials, AppointmentStatus, HmsError, NewDoctor, NewMedicalRecord, NewPatient, Role,
};
use hms_workflow::BookingRequest;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "HMS Web API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ---------------------------------------------------------------------------
// 医生
// ---------------------------------------------------------------------------

/// 首页医生列表，无需身份
pub async fn public_doctors(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let doctors = state.directory.list_public_doctors().await?;
    Ok(Json(json!({ "doctors": doctors, "total": doctors.len() })))
}

/// 仍有号源的医生
pub async fn available_doctors(State(state): State<AppState>, Caller(_caller): Caller) -> ApiResult<impl IntoResponse> {
    let doctors = state.engine.list_doctors_with_capacity().await?;
    Ok(Json(json!({ "doctors": doctors, "total": doctors.len() })))
}

pub async fn list_doctors(State(state): State<AppState>, Caller(caller): Caller) -> ApiResult<impl IntoResponse> {
    caller.ensure_admin()?;
    let doctors = state.directory.list_doctors().await?;
    Ok(Json(json!({ "doctors": doctors, "total": doctors.len() })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterDoctorRequest {
    #[serde(flatten)]
    pub doctor: NewDoctor,
    pub username: String,
    pub password_hash: String,
}

pub async fn register_doctor(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(request): JsonBody<RegisterDoctorRequest>,
) -> ApiResult<impl IntoResponse> {
    caller.ensure_admin()?;
    let credentials = AccountCredentials {
        username: request.username,
        password_hash: request.password_hash,
    };
    let doctor = state.directory.register_doctor(request.doctor, credentials).await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn doctor_slots(
    State(state): State<AppState>,
    Caller(_caller): Caller,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let available = state.engine.available_slots(doctor_id).await?;
    Ok(Json(json!({ "doctor_id": doctor_id, "available_slots": available })))
}

pub async fn doctor_appointments(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let appointments = state.engine.list_for_doctor(&caller, doctor_id).await?;
    Ok(Json(json!({ "appointments": appointments, "total": appointments.len() })))
}

// ---------------------------------------------------------------------------
// 患者
// ---------------------------------------------------------------------------

pub async fn list_patients(State(state): State<AppState>, Caller(caller): Caller) -> ApiResult<impl IntoResponse> {
    caller.ensure_admin()?;
    let patients = state.directory.list_patients().await?;
    Ok(Json(json!({ "patients": patients, "total": patients.len() })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterPatientRequest {
    #[serde(flatten)]
    pub patient: NewPatient,
    pub username: String,
    pub password_hash: String,
}

pub async fn register_patient(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(request): JsonBody<RegisterPatientRequest>,
) -> ApiResult<impl IntoResponse> {
    caller.ensure_admin()?;
    let credentials = AccountCredentials {
        username: request.username,
        password_hash: request.password_hash,
    };
    let patient = state.directory.register_patient(request.patient, credentials).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// 按ID或姓名查找患者
pub async fn search_patient(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    caller.ensure_staff()?;
    debug!("Searching patient by '{}'", params.q);

    match state.directory.search_patient(&params.q).await? {
        Some(patient) => Ok(Json(patient)),
        None => Err(HmsError::NotFound(format!("No patient matches '{}'", params.q)).into()),
    }
}

pub async fn patient_appointments(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let appointments = state.engine.list_for_patient(&caller, patient_id).await?;
    Ok(Json(json!({ "appointments": appointments, "total": appointments.len() })))
}

/// 病历列表：管理员、任意医生或患者本人
pub async fn patient_records(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if caller.role != Role::Doctor {
        caller.ensure_patient_scope(patient_id)?;
    }
    state.directory.find_patient(patient_id).await?;

    let records = state.records.list_records(patient_id).await?;
    Ok(Json(json!({ "records": records, "total": records.len() })))
}

pub async fn add_record(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(patient_id): Path<Uuid>,
    JsonBody(record): JsonBody<NewMedicalRecord>,
) -> ApiResult<impl IntoResponse> {
    caller.ensure_staff()?;
    let meta = state.records.add_record(patient_id, record).await?;
    Ok((StatusCode::CREATED, Json(meta)))
}

// ---------------------------------------------------------------------------
// 预约
// ---------------------------------------------------------------------------

pub async fn book_appointment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(request): JsonBody<BookingRequest>,
) -> ApiResult<impl IntoResponse> {
    let appointment = state.engine.book(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
}

pub async fn advance_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(appointment_id): Path<Uuid>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> ApiResult<impl IntoResponse> {
    let appointment = state
        .engine
        .advance_status(&caller, appointment_id, update.status)
        .await?;
    Ok(Json(appointment))
}

// ---------------------------------------------------------------------------
// 管理员
// ---------------------------------------------------------------------------

pub async fn change_admin_password(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(credentials): JsonBody<AccountCredentials>,
) -> ApiResult<impl IntoResponse> {
    caller.ensure_admin()?;
    state.directory.change_admin_password(&credentials).await?;
    info!("Admin password changed for '{}'", credentials.username);
    Ok(StatusCode::NO_CONTENT)
}
