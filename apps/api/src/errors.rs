use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractError;
use crate::llm_client::ModelError;
use crate::retrieval::RetrievalError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Retrieval error: {0}")]
    Retrieval(RetrievalError),

    #[error("Model error: {0}")]
    Model(ModelError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        match err {
            // An embedding backend failure is a model failure, wherever it surfaced.
            RetrievalError::Embedding(e) => AppError::Model(e),
            other => AppError::Retrieval(other),
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Model(err)
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Pdf(_) | ExtractError::Empty => {
                AppError::UnprocessableEntity(err.to_string())
            }
            ExtractError::Worker(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Model(_) => StatusCode::BAD_GATEWAY,
            AppError::Retrieval(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => ("UNPROCESSABLE_ENTITY", msg.clone()),
            AppError::Retrieval(e) => {
                tracing::error!("Retrieval error: {e}");
                (
                    "RETRIEVAL_ERROR",
                    "Resume retrieval failed".to_string(),
                )
            }
            AppError::Model(e) => {
                tracing::error!("Model error: {e}");
                (
                    "MODEL_ERROR",
                    "The model backend could not complete the request".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::ChunkConfigError;

    #[test]
    fn test_extract_errors_map_to_422_or_500() {
        assert_eq!(
            AppError::from(ExtractError::Empty).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(ExtractError::Pdf("bad xref".into())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(ExtractError::Worker("panicked".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_embedding_failure_surfaces_as_model_error() {
        let err = AppError::from(RetrievalError::Embedding(ModelError::EmptyOutput));
        assert!(matches!(err, AppError::Model(ModelError::EmptyOutput)));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_retrieval_errors_are_internal() {
        let err = AppError::from(RetrievalError::Config(ChunkConfigError::OverlapTooLarge {
            size: 10,
            overlap: 10,
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_response_status() {
        let response = AppError::Validation("missing resume".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
