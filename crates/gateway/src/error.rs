use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inference::ClassifyError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors returned by the JSON endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Model failed to load.")]
    ModelUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelUnavailable | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(ErrorBody { error: message })).into_response()
    }
}

impl From<ClassifyError> for ApiError {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::ModelUnavailable => ApiError::ModelUnavailable,
            e if e.is_client_error() => ApiError::BadRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(e.body_text())
        } else {
            ApiError::BadRequest(format!("Malformed upload: {}", e.body_text()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preprocess::PreprocessError;

    #[test]
    fn classify_errors_map_to_status() {
        let invalid = ClassifyError::Preprocess(PreprocessError::Empty);
        assert_eq!(ApiError::from(invalid).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(ClassifyError::ModelUnavailable).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(ClassifyError::InvalidScores).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn model_unavailable_keeps_its_message() {
        assert_eq!(ApiError::ModelUnavailable.to_string(), "Model failed to load.");
    }
}
