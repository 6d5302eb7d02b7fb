use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;
use vmr_core::taxonomy::ApiOperation;
use vmr_core::{ApiResponseError, ErrorCode};

use crate::dto::{VmRequestWithDeploy, VmRequestsList};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<VmRequestWithDeploy>> {
    // An id that cannot exist is reported like any other missing request.
    let request_id = Uuid::parse_str(&request_id).map_err(|_| {
        ApiError::new(
            ApiOperation::GetRequest,
            ApiResponseError::new(ErrorCode::RecordNotFound, "VM request not found"),
        )
    })?;

    let found = state
        .pipeline
        .queries()
        .get_request(request_id)
        .await
        .map_err(|e| ApiError::pipeline(ApiOperation::GetRequest, e))?;
    Ok(Json(found.into()))
}

pub async fn list_requests(State(state): State<AppState>) -> ApiResult<Json<VmRequestsList>> {
    let listing = state
        .pipeline
        .queries()
        .list_requests()
        .await
        .map_err(|e| ApiError::pipeline(ApiOperation::ListRequests, e))?;
    Ok(Json(listing.into()))
}
