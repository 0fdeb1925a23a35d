//! API错误响应

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hms_core::HmsError;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

/// 包装 `HmsError` 以转换为HTTP响应
#[derive(Debug)]
pub struct ApiError(pub HmsError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<HmsError> for ApiError {
    fn from(err: HmsError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            HmsError::NotFound(_) => StatusCode::NOT_FOUND,
            HmsError::CapacityExhausted(_)
            | HmsError::InvalidTransition { .. }
            | HmsError::ConflictingWrite(_)
            | HmsError::AlreadyExists(_) => StatusCode::CONFLICT,
            HmsError::Validation(_) => StatusCode::BAD_REQUEST,
            HmsError::Forbidden(_) => StatusCode::FORBIDDEN,
            HmsError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HmsError::Database(_) | HmsError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "kind": self.0.kind(),
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// JSON请求体，解析失败时返回统一格式的400响应
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    ApiError(HmsError::Validation(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hms_core::AppointmentStatus;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (HmsError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (HmsError::CapacityExhausted(Uuid::nil()), StatusCode::CONFLICT),
            (
                HmsError::InvalidTransition {
                    from: AppointmentStatus::Completed,
                    to: AppointmentStatus::Pending,
                },
                StatusCode::CONFLICT,
            ),
            (HmsError::ConflictingWrite("x".into()), StatusCode::CONFLICT),
            (HmsError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (HmsError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (HmsError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (HmsError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (HmsError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (HmsError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError(err).status_code(), expected);
        }
    }

    #[test]
    fn test_error_response_status() {
        let response = ApiError(HmsError::CapacityExhausted(Uuid::nil())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
