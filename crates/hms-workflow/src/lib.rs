//! # HMS预约工作流模块
//!
//! 提供预约的核心流程：
//! - 预约引擎：创建预约、扣减号源、推进预约状态，是唯一可以写预约表和号源台账的入口
//! - 预约状态机：只允许向前推进的状态转换
//! - 内存存储：与PostgreSQL实现语义一致的开发/测试后端

pub mod engine;
pub mod memory;
pub mod state_machine;

// 重新导出主要类型
pub use engine::{BookingEngine, BookingRequest, DEFAULT_CONFLICT_RETRIES};
pub use memory::InMemoryStore;
pub use state_machine::AppointmentStateMachine;
