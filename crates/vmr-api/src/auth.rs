use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use vmr_core::{ApiResponseError, ErrorCode, RequestScope};

use crate::error::ApiError;

/// Middleware that rejects requests without an `Authorization: Bearer`
/// header. The token itself is checked upstream.
pub async fn auth_middleware(req: Request, next: Next) -> Response {
    match bearer_token(req.headers()) {
        Some(_) => next.run(req).await,
        None => {
            ApiError::untyped(ErrorCode::Unauthorized, "missing bearer token").into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Longest scope id the request table stores.
pub const MAX_SCOPE_ID_LEN: usize = 50;

/// Tenant scope from the optional `X-Workspace-Id` and `X-Datacenter-Id`
/// headers.
pub fn request_scope(headers: &HeaderMap) -> Result<RequestScope, ApiResponseError> {
    let header = |name: &str| {
        let value = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if value.chars().count() > MAX_SCOPE_ID_LEN {
            return Err(ApiResponseError::new(
                ErrorCode::InvalidJson,
                format!("{name} longer than {MAX_SCOPE_ID_LEN} characters"),
            ));
        }
        Ok(value)
    };
    Ok(RequestScope {
        workspace_id: header("x-workspace-id")?,
        datacenter_id: header("x-datacenter-id")?,
    })
}
