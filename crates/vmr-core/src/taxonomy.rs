//! Mapping of service errors onto the typed error responses of each API
//! operation.
//!
//! Every error code resolves to one status class. Each operation declares
//! the status classes it has a typed response for; any other class falls
//! back to the operation's internal-error response. The mapping is total:
//! unknown codes become `INTERNAL_ERROR` and unknown operations get the
//! generic response.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use vmr_db::models::VmOperation;

use crate::error::{ApiResponseError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Unprocessable,
    Internal,
}

impl StatusClass {
    pub fn http_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Unprocessable => 422,
            Self::Internal => 500,
        }
    }

    fn shape_suffix(self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::Unprocessable => "UnprocessableEntity",
            Self::Internal => "InternalServerError",
        }
    }
}

impl From<ErrorCode> for StatusClass {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::InvalidJson => Self::BadRequest,
            ErrorCode::RecordNotFound => Self::NotFound,
            ErrorCode::StatusConflict => Self::Conflict,
            ErrorCode::ValidationError => Self::Unprocessable,
            ErrorCode::Unauthorized => Self::Unauthorized,
            ErrorCode::Forbidden => Self::Forbidden,
            ErrorCode::InternalError => Self::Internal,
        }
    }
}

/// Operations exposed by the API, each with its own set of typed errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Lifecycle(VmOperation),
    GetRequest,
    ListRequests,
}

impl ApiOperation {
    pub const READS: [ApiOperation; 2] = [Self::GetRequest, Self::ListRequests];

    /// Status classes with a typed response. Internal is always present.
    pub fn typed_classes(self) -> &'static [StatusClass] {
        use StatusClass::*;
        match self {
            Self::Lifecycle(VmOperation::Deploy) => &[BadRequest, Internal],
            Self::Lifecycle(VmOperation::Refresh) => &[NotFound, Internal],
            Self::Lifecycle(_) => &[BadRequest, NotFound, Internal],
            Self::GetRequest | Self::ListRequests => &[NotFound, Internal],
        }
    }

    fn shape_prefix(self) -> &'static str {
        match self {
            Self::Lifecycle(op) => match op {
                VmOperation::Deploy => "DeployVm",
                VmOperation::PowerOn => "VmPowerOn",
                VmOperation::PowerOff => "VmPowerOff",
                VmOperation::Delete => "VmDelete",
                VmOperation::Reset => "VmReset",
                VmOperation::Refresh => "VmRefresh",
                VmOperation::RestartGuestOs => "VmRestartGuestOs",
                VmOperation::ShutdownGuestOs => "VmShutdownGuestOs",
                VmOperation::Reconfigure => "EditVm",
            },
            Self::GetRequest => "GetVmRequest",
            Self::ListRequests => "ListVmRequests",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lifecycle(op) => op.as_str(),
            Self::GetRequest => "GET_REQUEST",
            Self::ListRequests => "LIST_REQUESTS",
        }
    }
}

impl From<VmOperation> for ApiOperation {
    fn from(op: VmOperation) -> Self {
        Self::Lifecycle(op)
    }
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("GET_REQUEST") {
            return Ok(Self::GetRequest);
        }
        if s.eq_ignore_ascii_case("LIST_REQUESTS") {
            return Ok(Self::ListRequests);
        }
        s.parse::<VmOperation>()
            .map(Self::Lifecycle)
            .map_err(|e| e.0)
    }
}

/// The response variant an error is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Typed {
        operation: ApiOperation,
        class: StatusClass,
    },
    /// Used when the operation itself is unknown.
    Generic { class: StatusClass },
}

impl ResponseShape {
    pub fn class(&self) -> StatusClass {
        match self {
            Self::Typed { class, .. } | Self::Generic { class } => *class,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Typed { operation, class } => {
                format!("{}{}", operation.shape_prefix(), class.shape_suffix())
            }
            Self::Generic { .. } => "ErrorResponse".to_string(),
        }
    }
}

/// Body shared by every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: String,
    pub http_status_code: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedError {
    pub shape: ResponseShape,
    pub body: ErrorResponse,
}

impl MappedError {
    pub fn http_status(&self) -> u16 {
        self.shape.class().http_status()
    }
}

/// Resolve a code string. Unknown codes become `INTERNAL_ERROR`.
fn resolve_code(code: &str) -> ErrorCode {
    code.parse().unwrap_or_else(|unknown: String| {
        tracing::warn!(code = %unknown, "unknown error code, reporting as internal error");
        ErrorCode::InternalError
    })
}

/// Map a service error onto the typed response of `operation`.
///
/// When the operation declares no response for the code's class the
/// internal response is used, but the body still reports the code's own
/// status.
pub fn map_service_error(err: &ApiResponseError, operation: ApiOperation) -> MappedError {
    let code = resolve_code(&err.error_code);
    let resolved = StatusClass::from(code);
    let class = if operation.typed_classes().contains(&resolved) {
        resolved
    } else {
        StatusClass::Internal
    };
    MappedError {
        shape: ResponseShape::Typed { operation, class },
        body: ErrorResponse {
            error_code: code.as_str().to_string(),
            http_status_code: resolved.http_status(),
            message: err.message.clone(),
        },
    }
}

/// Like [`map_service_error`] for an operation known only by name. Unknown
/// names get the generic response.
pub fn map_service_error_named(err: &ApiResponseError, operation: &str) -> MappedError {
    match operation.parse::<ApiOperation>() {
        Ok(op) => map_service_error(err, op),
        Err(_) => map_untyped(err),
    }
}

/// Generic response for errors raised outside any known operation.
pub fn map_untyped(err: &ApiResponseError) -> MappedError {
    let code = resolve_code(&err.error_code);
    let class = StatusClass::from(code);
    MappedError {
        shape: ResponseShape::Generic { class },
        body: ErrorResponse {
            error_code: code.as_str().to_string(),
            http_status_code: class.http_status(),
            message: err.message.clone(),
        },
    }
}
