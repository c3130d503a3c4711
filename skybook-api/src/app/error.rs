use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use skybook_core::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("Unauthorized", StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn unauthorized_with_message(message: impl Into<String>) -> Self {
        Self::new("Unauthorized", StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequest", StatusCode::BAD_REQUEST, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TooManyRequests", StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn mail_failed(message: impl Into<String>) -> Self {
        Self::new("MailDeliveryFailed", StatusCode::BAD_GATEWAY, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => {
                ApiError::new("NotFound", StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            ServiceError::AlreadyExists(what) => ApiError::new(
                "AlreadyExists",
                StatusCode::CONFLICT,
                format!("{what} already exists"),
            ),
            ServiceError::InvalidCredentials(msg) => {
                ApiError::new("InvalidCredentials", StatusCode::UNAUTHORIZED, msg)
            }
            ServiceError::EmailNotVerified => ApiError::new(
                "EmailNotVerified",
                StatusCode::UNAUTHORIZED,
                "please verify your email before logging in",
            ),
            ServiceError::Forbidden(msg) => {
                ApiError::new("Forbidden", StatusCode::FORBIDDEN, msg)
            }
            ServiceError::InvalidToken => ApiError::new(
                "InvalidToken",
                StatusCode::BAD_REQUEST,
                "token is invalid or has already been used",
            ),
            ServiceError::Expired(what) => ApiError::new(
                "Expired",
                StatusCode::BAD_REQUEST,
                format!("{what} has expired, please request a new one"),
            ),
            ServiceError::Conflict(msg) => {
                ApiError::new("Conflict", StatusCode::CONFLICT, msg)
            }
            ServiceError::PolicyViolation(msg) => {
                ApiError::new("PolicyViolation", StatusCode::BAD_REQUEST, msg)
            }
            ServiceError::RateLimited(msg) => {
                ApiError::new("TooManyRequests", StatusCode::TOO_MANY_REQUESTS, msg)
            }
            ServiceError::Io(e) => {
                ApiError::new("IoError", StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ServiceError::Serde(e) => {
                ApiError::new("SerdeError", StatusCode::BAD_REQUEST, e.to_string())
            }
            ServiceError::Other(msg) => {
                ApiError::new("Error", StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
