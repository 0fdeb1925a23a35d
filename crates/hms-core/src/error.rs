//! 错误定义模块

use crate::models::AppointmentStatus;
use thiserror::Error;
use uuid::Uuid;

/// HMS系统统一错误类型
#[derive(Error, Debug)]
pub enum HmsError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("号源已用尽: 医生 {0}")]
    CapacityExhausted(Uuid),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("并发写入冲突: {0}")]
    ConflictingWrite(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("权限错误: {0}")]
    Forbidden(String),

    #[error("未认证: {0}")]
    Unauthorized(String),

    #[error("资源已存在: {0}")]
    AlreadyExists(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl HmsError {
    /// 稳定的错误类别标识，用于API响应
    pub fn kind(&self) -> &'static str {
        match self {
            HmsError::NotFound(_) => "not_found",
            HmsError::CapacityExhausted(_) => "capacity_exhausted",
            HmsError::InvalidTransition { .. } => "invalid_transition",
            HmsError::ConflictingWrite(_) => "conflicting_write",
            HmsError::Validation(_) => "validation_error",
            HmsError::Forbidden(_) => "forbidden",
            HmsError::Unauthorized(_) => "unauthorized",
            HmsError::AlreadyExists(_) => "already_exists",
            HmsError::Database(_) => "database_error",
            HmsError::Internal(_) => "internal_error",
        }
    }

    /// 是否为可重试的存储层冲突
    pub fn is_conflict(&self) -> bool {
        matches!(self, HmsError::ConflictingWrite(_))
    }
}

/// HMS系统统一结果类型
pub type Result<T> = std::result::Result<T, HmsError>;
