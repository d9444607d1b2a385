use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::ports::document_repository::DocumentError;
use crate::application::use_cases::auth::AuthError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorInfo {
    pub code: u16,
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

/// `{"response": ...}`
#[derive(Debug, Serialize)]
pub struct ResponseEnvelope<T: Serialize> {
    pub response: T,
}

/// `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T: Serialize> {
    pub data: T,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub text: String,
}

impl ApiError {
    pub fn new(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authorization token required")
    }

    pub fn bad_request(text: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, text)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorInfo {
                code: self.status.as_u16(),
                text: self.text,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Validation(msg) => ApiError::bad_request(msg),
            DocumentError::Unauthenticated => {
                ApiError::new(StatusCode::UNAUTHORIZED, "Invalid token")
            }
            // one answer for both so unauthorized callers cannot probe ids
            DocumentError::AccessDenied | DocumentError::NotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "document not found")
            }
            DocumentError::Storage(e) => {
                tracing::error!(error = ?e, "document_storage_error");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidAdminToken => ApiError::new(StatusCode::FORBIDDEN, err.to_string()),
            AuthError::Validation(msg) => ApiError::bad_request(msg),
            AuthError::LoginTaken => ApiError::new(StatusCode::CONFLICT, err.to_string()),
            AuthError::InvalidCredentials => {
                ApiError::new(StatusCode::UNAUTHORIZED, "Invalid credentials")
            }
            AuthError::Storage(e) => {
                tracing::error!(error = ?e, "auth_storage_error");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}
