use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use vmr_core::taxonomy::{self, ApiOperation, ErrorResponse, MappedError};
use vmr_core::{ApiResponseError, ErrorCode, PipelineError};

/// An error on its way to the caller, rendered as the typed response of the
/// operation that raised it.
#[derive(Debug, thiserror::Error)]
#[error("{}: {}", .error.error_code, .error.message)]
pub struct ApiError {
    operation: Option<ApiOperation>,
    error: ApiResponseError,
}

impl ApiError {
    pub fn new(operation: impl Into<ApiOperation>, error: ApiResponseError) -> Self {
        Self {
            operation: Some(operation.into()),
            error,
        }
    }

    pub fn pipeline(operation: impl Into<ApiOperation>, err: PipelineError) -> Self {
        Self::new(operation, ApiResponseError::from(&err))
    }

    pub fn invalid_body(operation: impl Into<ApiOperation>, err: serde_json::Error) -> Self {
        Self::new(
            operation,
            ApiResponseError::new(ErrorCode::InvalidJson, format!("invalid request body: {err}")),
        )
    }

    /// Raised before the target operation is known.
    pub fn untyped(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            operation: None,
            error: ApiResponseError::new(code, message),
        }
    }

    fn mapped(&self) -> MappedError {
        match self.operation {
            Some(op) => taxonomy::map_service_error(&self.error, op),
            None => taxonomy::map_untyped(&self.error),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mapped = self.mapped();
        let status =
            StatusCode::from_u16(mapped.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(shape = %mapped.shape.name(), error = %self, "request failed");
        } else {
            tracing::debug!(shape = %mapped.shape.name(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            kind: mapped.shape.name(),
            body: mapped.body,
        };
        (status, Json(body)).into_response()
    }
}
