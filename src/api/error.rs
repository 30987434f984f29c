use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::{IngestError, QueryError, SensoriumError};

/// Error returned by handlers, rendered as `{ "error": message }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(message) => message,
            ApiError::Internal(detail) => {
                error!(target: "sensorium::api", error = %detail, "Request failed");
                "Internal server error".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<SensoriumError> for ApiError {
    fn from(err: SensoriumError) -> Self {
        if err.is_client_error() {
            match err {
                SensoriumError::Ingest(e) => e.into(),
                SensoriumError::Query(e) => e.into(),
                other => ApiError::BadRequest(other.to_string()),
            }
        } else {
            ApiError::Internal(format!("[{}] {}", err.category(), err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_requests() {
        let err: ApiError = SensoriumError::from(IngestError::MissingTimestamp).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Missing timestamp"));
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err: ApiError = SensoriumError::Internal("lock poisoned".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
