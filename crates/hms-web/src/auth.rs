//! 调用方身份提取
//!
//! 认证由前置网关完成，网关通过请求头传入角色和档案ID。

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use hms_core::{CallerContext, HmsError, Result, Role};
use uuid::Uuid;

/// 角色请求头
pub const ROLE_HEADER: &str = "x-hms-role";
/// 档案ID请求头
pub const USER_ID_HEADER: &str = "x-hms-user-id";

/// 已认证的调用方
#[derive(Debug, Clone)]
pub struct Caller(pub CallerContext);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let context = caller_from_headers(&parts.headers)?;
        tracing::debug!("Request from {} {:?}", context.role, context.user_id);
        Ok(Caller(context))
    }
}

/// 从请求头解析调用方身份
pub fn caller_from_headers(headers: &HeaderMap) -> Result<CallerContext> {
    let role: Role = header_str(headers, ROLE_HEADER)?
        .ok_or_else(|| HmsError::Unauthorized(format!("missing {} header", ROLE_HEADER)))?
        .parse()?;

    let user_id = match header_str(headers, USER_ID_HEADER)? {
        Some(raw) => Some(
            Uuid::parse_str(raw.trim())
                .map_err(|_| HmsError::Unauthorized(format!("invalid {} header", USER_ID_HEADER)))?,
        ),
        None => None,
    };

    CallerContext::new(role, user_id)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>> {
    match headers.get(name) {
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| HmsError::Unauthorized(format!("invalid {} header", name))),
        None => Ok(None),
    }
}
