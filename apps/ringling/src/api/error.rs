//! # API Errors
//!
//! Maps registry errors and extractor rejections to HTTP responses with the
//! body `{"error": <kind>, "message": <text>}`.
//!
//! | Kind | Status |
//! |------|--------|
//! | `validation` | 400 |
//! | `not_found` | 404 |
//! | `conflict` | 409 |
//! | `backtest_required` | 412 |
//! | `invalid_transition` | 422 |
//! | `storage` | 500 |

use super::types::ErrorResponse;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ringling_core::{ErrorKind, RegistryError};

/// An error returned by a handler.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A 400 with a custom message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A 404 with a custom message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// HTTP status for an error kind.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::BacktestRequired => StatusCode::PRECONDITION_FAILED,
        ErrorKind::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind);
        if self.kind == ErrorKind::Storage {
            tracing::error!(error_kind = %self.kind, "{}", self.message);
        } else {
            tracing::warn!(error_kind = %self.kind, "{}", self.message);
        }

        let body = ErrorResponse {
            error: self.kind.as_str().to_string(),
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringling_core::{DeploymentStage, ParameterSetId, ProjectId, TrainedModelId};

    #[test]
    fn statuses_follow_kinds() {
        let cases = [
            (
                RegistryError::validation("active_until", "before start"),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::ParameterSetNotFound(ParameterSetId(1)),
                StatusCode::NOT_FOUND,
            ),
            (
                RegistryError::Conflict {
                    project_id: ProjectId(1),
                    parameter_set_id: None,
                    conflicting_id: ParameterSetId(2),
                },
                StatusCode::CONFLICT,
            ),
            (
                RegistryError::BacktestRequired {
                    model_id: TrainedModelId(1),
                    target: DeploymentStage::Staging,
                },
                StatusCode::PRECONDITION_FAILED,
            ),
            (
                RegistryError::StageLocked {
                    model_id: TrainedModelId(1),
                    stage: DeploymentStage::Production,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                RegistryError::Storage("disk full".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.into_response().status(), expected);
        }
    }
}
