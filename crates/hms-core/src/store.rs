//! 存储契约
//!
//! 预约引擎和Web层只依赖这些trait，PostgreSQL与内存实现可互换。

use crate::error::Result;
use crate::models::*;
use async_trait::async_trait;
use uuid::Uuid;

/// 医生/患者档案及账号存储
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// 根据ID查找医生
    async fn find_doctor(&self, id: Uuid) -> Result<Doctor>;

    /// 根据ID查找患者
    async fn find_patient(&self, id: Uuid) -> Result<Patient>;

    /// 仍有剩余号源的医生
    async fn list_doctors_with_capacity(&self) -> Result<Vec<Doctor>>;

    /// 所有医生及其登录账号
    async fn list_doctors(&self) -> Result<Vec<DoctorListing>>;

    /// 所有患者及其登录账号
    async fn list_patients(&self) -> Result<Vec<PatientListing>>;

    /// 首页展示用的医生列表
    async fn list_public_doctors(&self) -> Result<Vec<PublicDoctor>>;

    /// 按ID或姓名查找患者
    async fn search_patient(&self, query: &str) -> Result<Option<Patient>>;

    /// 在同一事务中登记医生档案和登录账号
    async fn register_doctor(&self, doctor: NewDoctor, credentials: AccountCredentials) -> Result<Doctor>;

    /// 在同一事务中登记患者信息和登录账号
    async fn register_patient(&self, patient: NewPatient, credentials: AccountCredentials) -> Result<Patient>;

    /// 不存在时创建管理员账号，返回是否新建
    async fn ensure_admin(&self, credentials: &AccountCredentials) -> Result<bool>;

    /// 更新管理员口令哈希
    async fn change_admin_password(&self, credentials: &AccountCredentials) -> Result<()>;
}

/// 病历元数据存储
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 患者的病历，按上传时间倒序
    async fn list_records(&self, patient_id: Uuid) -> Result<Vec<MedicalRecordMeta>>;

    async fn add_record(&self, patient_id: Uuid, record: NewMedicalRecord) -> Result<MedicalRecordMeta>;
}

/// 预约与号源台账存储
///
/// `create_booking` 和 `update_status` 是仅供预约引擎调用的写操作。
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// 医生的剩余号源
    async fn available_slots(&self, doctor_id: Uuid) -> Result<i32>;

    /// 原子单元：校验医生和患者存在、校验剩余号源、插入Pending预约、扣减号源。
    /// 任一步失败都不留下任何修改。
    async fn create_booking(&self, booking: &NewAppointment) -> Result<Appointment>;

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment>;

    /// 比较并交换：仅当当前状态仍为 `expected` 时写入 `new_status`，
    /// 否则返回 `ConflictingWrite`。
    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<Appointment>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>>;
}
