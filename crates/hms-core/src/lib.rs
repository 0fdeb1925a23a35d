//! # HMS Core
//!
//! 医院管理系统的核心模块，提供领域数据结构、统一错误类型、调用方上下文、
//! 存储契约以及号源扣减规则。

pub mod context;
pub mod error;
pub mod ledger;
pub mod models;
pub mod store;
pub mod utils;

pub use context::{CallerContext, Role};
pub use error::{HmsError, Result};
pub use models::*;
pub use store::{AppointmentStore, DirectoryStore, RecordStore};
