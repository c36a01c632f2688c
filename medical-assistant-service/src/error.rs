use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use care_flow::FlowError;
use serde_json::json;
use thiserror::Error;

/// Shown when the form is submitted without an API key
pub const MISSING_KEY_MESSAGE: &str = "Please enter an API key before proceeding.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", MISSING_KEY_MESSAGE)]
    MissingCredential,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FlowError> for AppError {
    fn from(error: FlowError) -> Self {
        match error {
            FlowError::Authentication(message) => AppError::Authentication(message),
            FlowError::Upstream(message) => AppError::Upstream(message),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingCredential | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Internal(details) => {
                tracing::error!(error = %details, "Internal error");
                "Internal server error".to_string()
            }
            other => {
                tracing::warn!(error = %other, status = status.as_u16(), "Request failed");
                other.to_string()
            }
        };

        (
            status,
            Json(json!({
                "error": message,
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_uses_the_form_message() {
        assert_eq!(
            AppError::MissingCredential.to_string(),
            "Please enter an API key before proceeding."
        );
    }

    #[test]
    fn capability_errors_pass_their_text_through() {
        let error = AppError::from(FlowError::Upstream("rate limited".to_string()));
        assert_eq!(error.to_string(), "rate limited");
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);

        let error = AppError::from(FlowError::Authentication("bad key".to_string()));
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn pipeline_errors_become_internal() {
        let error = AppError::from(FlowError::InvalidPipeline("empty".to_string()));
        assert!(matches!(error, AppError::Internal(_)));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_status_codes() {
        let cases = vec![
            (AppError::MissingCredential, StatusCode::BAD_REQUEST),
            (AppError::Validation("age".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
