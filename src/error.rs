use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Feature columns missing, unexpected or non-numeric
    #[error("Schema error: {0}")]
    Schema(String),

    /// No saved pipeline/codec artifacts to load
    #[error("Model artifacts not found: {0}")]
    ArtifactMissing(String),

    /// Save attempted before any pipeline was trained
    #[error("Model has not been trained yet")]
    Untrained,

    /// Training set cannot support the configured split/fold counts
    #[error("Training data error: {0}")]
    TrainingData(String),

    /// Request field validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error.
    ///
    /// Only caller input and readiness surface as their own status; core
    /// failures are all 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ArtifactMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Untrained => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TrainingData(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Schema(_) => "SCHEMA_ERROR",
            AppError::ArtifactMissing(_) => "ARTIFACT_MISSING",
            AppError::Untrained => "UNTRAINED",
            AppError::TrainingData(_) => "TRAINING_DATA_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message that is safe to hand back to API clients.
    ///
    /// Validation failures describe the caller's own input; everything else is
    /// collapsed so model internals never leak over the wire.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => format!("Validation error: {}", msg),
            AppError::ArtifactMissing(_) => "Model not loaded".to_string(),
            _ => "Internal processing error".to_string(),
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %self,
            "Request error"
        );

        let body = Json(json!({
            "detail": self.public_message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from ndarray::ShapeError
impl From<ndarray::ShapeError> for AppError {
    fn from(err: ndarray::ShapeError) -> Self {
        AppError::Schema(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::ArtifactMissing("test".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Validation("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Untrained.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_status_matches_status_code() {
        let errors = [
            AppError::Schema("x".to_string()),
            AppError::TrainingData("x".to_string()),
            AppError::Validation("x".to_string()),
            AppError::ArtifactMissing("x".to_string()),
            AppError::Untrained,
        ];
        for err in errors {
            let expected = err.status_code();
            assert_eq!(err.into_response().status(), expected);
        }
        assert_eq!(
            AppError::Schema("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Schema("x".to_string()).error_code(), "SCHEMA_ERROR");
        assert_eq!(
            AppError::TrainingData("x".to_string()).error_code(),
            "TRAINING_DATA_ERROR"
        );
        assert_eq!(AppError::Untrained.error_code(), "UNTRAINED");
    }

    #[test]
    fn test_public_message_is_opaque() {
        let err = AppError::Schema("missing column oil_level".to_string());
        assert_eq!(err.public_message(), "Internal processing error");

        let err = AppError::ArtifactMissing("artifacts/pipeline.bin".to_string());
        assert_eq!(err.public_message(), "Model not loaded");
    }
}
