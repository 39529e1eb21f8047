//! JSON error responses shared by the API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use medusa_core::{CacheError, HistoryError, LibraryError, QueueError};

/// Error body returned by every failing handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        let status = match e {
            LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
            LibraryError::AlreadyExists(_) => StatusCode::CONFLICT,
            LibraryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LibraryError::SchemaTooNew { .. } | LibraryError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        let status = match e {
            QueueError::Duplicate(_) => StatusCode::CONFLICT,
            QueueError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        Self::new(status, e.to_string())
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        Self::internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_library_errors_map_to_status() {
        let cases = [
            (LibraryError::NotFound("show 1".into()), StatusCode::NOT_FOUND),
            (LibraryError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (LibraryError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (LibraryError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_queue_errors_map_to_status() {
        assert_eq!(
            ApiError::from(QueueError::Duplicate("daily".into())).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(QueueError::NotFound(Uuid::new_v4())).status,
            StatusCode::NOT_FOUND
        );
    }
}
