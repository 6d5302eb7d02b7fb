use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vmr_db::StoreError;

/// Failure of any pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    NotFound(String),

    /// A referenced entity is missing or not in a state that permits the
    /// operation.
    #[error("{0}")]
    ValidationFailed(String),

    /// A validation service could not be reached or answered with an error.
    #[error("{0}")]
    DependencyUnavailable(String),

    #[error("malformed request metadata: {0}")]
    MalformedInput(#[from] serde_json::Error),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl PipelineError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            PipelineError::NotFound(_) => ErrorCode::RecordNotFound,
            PipelineError::ValidationFailed(_) => ErrorCode::ValidationError,
            PipelineError::DependencyUnavailable(_) => ErrorCode::InternalError,
            PipelineError::MalformedInput(_) => ErrorCode::InvalidJson,
            PipelineError::Storage(StoreError::NotFound) => ErrorCode::RecordNotFound,
            PipelineError::Storage(_) => ErrorCode::InternalError,
            PipelineError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Stable error codes shared with API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidJson,
    RecordNotFound,
    StatusConflict,
    ValidationError,
    Unauthorized,
    Forbidden,
    InternalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 7] = [
        Self::InvalidJson,
        Self::RecordNotFound,
        Self::StatusConflict,
        Self::ValidationError,
        Self::Unauthorized,
        Self::Forbidden,
        Self::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidJson => "INVALID_JSON",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::StatusConflict => "STATUS_CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Error carrier handed from the pipeline to the taxonomy mapper.
///
/// The code is kept as a string: codes coming from elsewhere may be
/// unknown, and the mapper resolves those to `INTERNAL_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponseError {
    pub error_code: String,
    pub message: String,
}

impl ApiResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: code.as_str().to_string(),
            message: message.into(),
        }
    }
}

impl From<&PipelineError> for ApiResponseError {
    fn from(err: &PipelineError) -> Self {
        Self::new(err.error_code(), err.to_string())
    }
}

impl From<PipelineError> for ApiResponseError {
    fn from(err: PipelineError) -> Self {
        Self::from(&err)
    }
}
