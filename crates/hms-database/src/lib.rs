//! # HMS数据库模块
//!
//! 基于PostgreSQL的档案、账号、病历和预约存储。预约创建与号源扣减在同一个
//! 行锁事务中完成。

pub mod booking;
pub mod connection;
pub mod ledger;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{DatabasePool, PoolSettings};
pub use models::*;
pub use queries::DatabaseQueries;
