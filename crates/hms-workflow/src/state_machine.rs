//! 预约状态机
//!
//! 管理预约的生命周期状态转换，只允许向前推进

use hms_core::{AppointmentStatus, HmsError, Result};
use std::collections::HashSet;

/// 预约状态机
#[derive(Debug)]
pub struct AppointmentStateMachine {
    transitions: HashSet<(AppointmentStatus, AppointmentStatus)>,
}

impl AppointmentStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashSet::new();

        // 定义状态转换规则
        transitions.insert((AppointmentStatus::Pending, AppointmentStatus::Confirmed));
        transitions.insert((AppointmentStatus::Confirmed, AppointmentStatus::Completed));
        transitions.insert((AppointmentStatus::Pending, AppointmentStatus::Completed));

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: AppointmentStatus, to: AppointmentStatus) -> bool {
        self.transitions.contains(&(from, to))
    }

    /// 校验状态转换，返回目标状态
    pub fn transition(&self, from: AppointmentStatus, to: AppointmentStatus) -> Result<AppointmentStatus> {
        if self.can_transition(from, to) {
            Ok(to)
        } else {
            Err(HmsError::InvalidTransition { from, to })
        }
    }
}

impl Default for AppointmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
