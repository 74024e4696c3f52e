use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::models::envelope::Reply;

/// HTTP error carrying the same `{code, message, details}` envelope the
/// WebSocket surface uses.
pub struct ApiError {
    pub status: StatusCode,
    pub body: Reply,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: Reply::error(StatusCode::BAD_REQUEST.as_u16(), message),
    }
}

pub fn internal_error(message: impl Into<String>, details: Value) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: Reply::error_with_details(
            StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            message,
            details,
        ),
    }
}
