use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

use bizchat_core::ChatError;

/// Error returned by every handler, rendered as
/// `{"error": "<code>", "message": "<text>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "Authentication required",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::InvalidInput(_) => Self::invalid_input(message),
            ChatError::ChatbotNotFound | ChatError::ConversationNotFound => {
                Self::new(StatusCode::NOT_FOUND, "not_found", message)
            }
            ChatError::Inactive => Self::new(StatusCode::FORBIDDEN, "inactive", message),
            ChatError::Forbidden => Self::new(StatusCode::FORBIDDEN, "forbidden", message),
            ChatError::Store(_) | ChatError::Task(_) => {
                error!(error = %message, "Request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_input(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_input(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ChatError::InvalidInput("bad".to_string()),
                StatusCode::BAD_REQUEST,
                "invalid_input",
            ),
            (ChatError::ChatbotNotFound, StatusCode::NOT_FOUND, "not_found"),
            (ChatError::ConversationNotFound, StatusCode::NOT_FOUND, "not_found"),
            (ChatError::Inactive, StatusCode::FORBIDDEN, "inactive"),
            (ChatError::Forbidden, StatusCode::FORBIDDEN, "forbidden"),
            (
                ChatError::Task("panicked".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn test_internal_message_is_generic() {
        let api = ApiError::from(ChatError::Task("secret detail".to_string()));
        assert!(!api.message.contains("secret"));
    }
}
