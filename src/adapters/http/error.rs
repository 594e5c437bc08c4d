//! JSON error responses shared by every route.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::application::runtime::DispatchError;
use crate::application::{AllocatorError, EngineError, LibraryError};
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::domain::script::ScriptConfigError;
use crate::ports::SessionStoreError;

/// Standard error body: `{ "code": ..., "message": ... }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    /// Request body or signature rejected before reaching the engine.
    Rejected {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            code: "INVALID_SIGNATURE",
            message: message.into(),
        }
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed | ErrorCode::InvalidCommand => StatusCode::BAD_REQUEST,
        ErrorCode::SessionNotFound
        | ErrorCode::ScriptVersionNotFound
        | ErrorCode::AlertNotFound
        | ErrorCode::OrderNotFound => StatusCode::NOT_FOUND,
        ErrorCode::ScriptConfigInvalid => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::ConcurrencyConflict => StatusCode::CONFLICT,
        ErrorCode::AIProviderError | ErrorCode::TransportError => StatusCode::BAD_GATEWAY,
        ErrorCode::PersistenceError | ErrorCode::EventDeliveryFailed | ErrorCode::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(error) => {
                let status = status_for(error.code);
                if status.is_server_error() {
                    tracing::error!(code = %error.code, message = %error.message, "request failed");
                }
                let body = ErrorResponse {
                    code: error.code.to_string(),
                    message: error.message,
                    details: error.details,
                };
                (status, Json(body)).into_response()
            }
            ApiError::Rejected {
                status,
                code,
                message,
            } => (status, Json(ErrorResponse::new(code, message))).into_response(),
        }
    }
}

macro_rules! domain_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for ApiError {
                fn from(err: $source) -> Self {
                    ApiError::Domain(err.into())
                }
            }
        )*
    };
}

domain_error_from!(
    ValidationError,
    SessionStoreError,
    EngineError,
    DispatchError,
    LibraryError,
    AllocatorError,
    ScriptConfigError,
);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ChatId;

    #[test]
    fn missing_session_maps_to_404() {
        let err: ApiError = SessionStoreError::NotFound(ChatId::new("c1").unwrap()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_chat_id_maps_to_400() {
        let err: ApiError = ChatId::new("").unwrap_err().into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflicts_and_config_errors_have_their_own_statuses() {
        assert_eq!(status_for(ErrorCode::ConcurrencyConflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorCode::ScriptConfigInvalid),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorCode::TransportError), StatusCode::BAD_GATEWAY);
    }
}
