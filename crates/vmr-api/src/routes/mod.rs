pub mod operations;
pub mod requests;

use std::any::Any;

use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router, middleware};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use vmr_core::ErrorCode;

use crate::auth::auth_middleware;
use crate::error::ApiError;
use crate::state::AppState;

pub const API_PREFIX: &str = "/virtualization/v1beta1";

pub fn create_app(state: AppState) -> Router {
    let vms = Router::new()
        .route("/virtual-machines", post(operations::deploy_vm))
        .route(
            "/virtual-machines/{vm_id}",
            patch(operations::reconfigure_vm).delete(operations::delete_vm),
        )
        .route("/virtual-machines/{vm_id}/power-on", post(operations::power_on_vm))
        .route("/virtual-machines/{vm_id}/power-off", post(operations::power_off_vm))
        .route("/virtual-machines/{vm_id}/reset", post(operations::reset_vm))
        .route("/virtual-machines/{vm_id}/refresh", post(operations::refresh_vm))
        .route(
            "/virtual-machines/{vm_id}/restart-guest-os",
            post(operations::restart_guest_os),
        )
        .route(
            "/virtual-machines/{vm_id}/shutdown-guest-os",
            post(operations::shutdown_guest_os),
        )
        .route("/virtual-machines-request", get(requests::list_requests))
        .route(
            "/virtual-machines-request/{request_id}",
            get(requests::get_request),
        )
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, vms)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "handler panicked");
    ApiError::untyped(ErrorCode::InternalError, "internal server error").into_response()
}
