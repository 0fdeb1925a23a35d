//! 调用方上下文
//!
//! 每次调用都显式携带调用方身份，不依赖全局会话状态。

use crate::error::{HmsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 管理员 - 完全访问权限
    Admin,
    /// 医生 - 只能查看和处理自己的预约
    Doctor,
    /// 患者 - 只能预约和查看自己的数据
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Doctor => write!(f, "doctor"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

impl FromStr for Role {
    type Err = HmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(HmsError::Unauthorized(format!("unknown role: {}", other))),
        }
    }
}

/// 已认证的调用方身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub role: Role,
    /// 医生或患者的档案ID；管理员为None
    pub user_id: Option<Uuid>,
}

impl CallerContext {
    pub fn admin() -> Self {
        Self { role: Role::Admin, user_id: None }
    }

    pub fn doctor(doctor_id: Uuid) -> Self {
        Self { role: Role::Doctor, user_id: Some(doctor_id) }
    }

    pub fn patient(patient_id: Uuid) -> Self {
        Self { role: Role::Patient, user_id: Some(patient_id) }
    }

    /// 根据角色和ID构造上下文，医生和患者必须提供ID
    pub fn new(role: Role, user_id: Option<Uuid>) -> Result<Self> {
        match (role, user_id) {
            (Role::Admin, _) => Ok(Self::admin()),
            (_, Some(id)) => Ok(Self { role, user_id: Some(id) }),
            (_, None) => Err(HmsError::Unauthorized(format!("{} identity requires a user id", role))),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 调用方是否为指定医生本人
    pub fn is_doctor(&self, doctor_id: Uuid) -> bool {
        self.role == Role::Doctor && self.user_id == Some(doctor_id)
    }

    /// 调用方是否为指定患者本人
    pub fn is_patient(&self, patient_id: Uuid) -> bool {
        self.role == Role::Patient && self.user_id == Some(patient_id)
    }

    pub fn ensure_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(self.denied("admin only"))
        }
    }

    /// 管理员或医生
    pub fn ensure_staff(&self) -> Result<()> {
        match self.role {
            Role::Admin | Role::Doctor => Ok(()),
            Role::Patient => Err(self.denied("staff only")),
        }
    }

    /// 管理员或该患者本人
    pub fn ensure_patient_scope(&self, patient_id: Uuid) -> Result<()> {
        if self.is_admin() || self.is_patient(patient_id) {
            Ok(())
        } else {
            Err(self.denied(&format!("no access to patient {}", patient_id)))
        }
    }

    /// 管理员或该医生本人
    pub fn ensure_doctor_scope(&self, doctor_id: Uuid) -> Result<()> {
        if self.is_admin() || self.is_doctor(doctor_id) {
            Ok(())
        } else {
            Err(self.denied(&format!("no access to doctor {}", doctor_id)))
        }
    }

    fn denied(&self, reason: &str) -> HmsError {
        tracing::warn!(role = %self.role, user_id = ?self.user_id, "Access denied: {}", reason);
        HmsError::Forbidden(reason.to_string())
    }
}
