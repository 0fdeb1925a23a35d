//! # HMS Web服务模块
//!
//! 基于axum的HTTP接口：
//! - 调用方身份由网关通过请求头传入
//! - 预约相关写操作全部经过预约引擎
//! - 统一的错误响应格式

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::Caller;
pub use error::{ApiError, ApiResult};
pub use server::{AppState, WebServer};
