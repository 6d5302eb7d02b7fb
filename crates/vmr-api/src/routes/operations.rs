use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use vmr_core::AdmittedRequest;
use vmr_core::payload::{DeployVmRequest, VmOperationRequest};
use vmr_db::models::VmOperation;

use crate::auth::request_scope;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn accepted(state: &AppState, admitted: &AdmittedRequest) -> Response {
    let location = state.request_location(admitted.request.request_id);
    (
        StatusCode::ACCEPTED,
        [(header::LOCATION, location)],
        Json(serde_json::json!({})),
    )
        .into_response()
}

pub async fn deploy_vm(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let req: DeployVmRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid_body(VmOperation::Deploy, e))?;

    let scope = request_scope(&headers).map_err(|e| ApiError::new(VmOperation::Deploy, e))?;
    let admitted = state
        .pipeline
        .deploy(req, &scope)
        .await
        .map_err(|e| ApiError::pipeline(VmOperation::Deploy, e))?;
    Ok(accepted(&state, &admitted))
}

pub async fn reconfigure_vm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let spec: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid_body(VmOperation::Reconfigure, e))?;

    let req = VmOperationRequest {
        vm_id,
        spec: Some(spec),
    };
    submit(&state, &headers, VmOperation::Reconfigure, req).await
}

pub async fn delete_vm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
) -> ApiResult<Response> {
    submit(&state, &headers, VmOperation::Delete, VmOperationRequest::new(vm_id)).await
}

pub async fn power_on_vm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
) -> ApiResult<Response> {
    submit(&state, &headers, VmOperation::PowerOn, VmOperationRequest::new(vm_id)).await
}

pub async fn power_off_vm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
) -> ApiResult<Response> {
    submit(&state, &headers, VmOperation::PowerOff, VmOperationRequest::new(vm_id)).await
}

pub async fn reset_vm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
) -> ApiResult<Response> {
    submit(&state, &headers, VmOperation::Reset, VmOperationRequest::new(vm_id)).await
}

pub async fn refresh_vm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
) -> ApiResult<Response> {
    submit(&state, &headers, VmOperation::Refresh, VmOperationRequest::new(vm_id)).await
}

pub async fn restart_guest_os(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
) -> ApiResult<Response> {
    submit(
        &state,
        &headers,
        VmOperation::RestartGuestOs,
        VmOperationRequest::new(vm_id),
    )
    .await
}

pub async fn shutdown_guest_os(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vm_id): Path<String>,
) -> ApiResult<Response> {
    submit(
        &state,
        &headers,
        VmOperation::ShutdownGuestOs,
        VmOperationRequest::new(vm_id),
    )
    .await
}

async fn submit(
    state: &AppState,
    headers: &HeaderMap,
    operation: VmOperation,
    req: VmOperationRequest,
) -> ApiResult<Response> {
    let scope = request_scope(headers).map_err(|e| ApiError::new(operation, e))?;
    let admitted = state
        .pipeline
        .submit(operation, req, &scope)
        .await
        .map_err(|e| ApiError::pipeline(operation, e))?;
    Ok(accepted(state, &admitted))
}
