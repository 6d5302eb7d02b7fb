//! Shared fixtures for vmr-api tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use monitor_api::VmMetrics;
use vmr_api::{AppConfig, AppState, create_app};
use vmr_core::clients::{LookupError, LookupResult, VmStatusSource};
use vmr_core::{AdmissionPipeline, ValidationClients};
use vmr_db::memory::MemoryRequestStore;

pub const TOKEN: &str = "Bearer test-token";

/// Config for a memory-backed app. Monitor URLs point at a closed port.
pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = [
        ("STORE_BACKEND", "memory"),
        ("IMAGE_MANAGER_URL", "http://127.0.0.1:9"),
        ("INFRA_MONITOR_URL", "http://127.0.0.1:9"),
        ("VM_MONITOR_URL", "http://127.0.0.1:9"),
        ("LOOKUP_TIMEOUT_MS", "2000"),
        ("STRICT_VM_TIMEOUT_MS", "2000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|name| vars.get(name).cloned()).expect("valid test config")
}

fn app_with(store: &MemoryRequestStore, config: AppConfig, clients: ValidationClients) -> Router {
    let pipeline = AdmissionPipeline::new(clients, Arc::new(store.clone()), config.pipeline.clone());
    create_app(AppState::new(pipeline, config))
}

/// App with validation disabled.
pub fn create_test_app(store: &MemoryRequestStore) -> Router {
    let config = test_config(&[]);
    let clients = ValidationClients::from_endpoints(&config.monitors);
    app_with(store, config, clients)
}

/// App validating against unreachable image and infra services and the
/// given VM status source.
pub fn create_validating_app(store: &MemoryRequestStore, vms: Arc<dyn VmStatusSource>) -> Router {
    let config = test_config(&[("VALIDATE_CLIENT_REQUEST", "true")]);
    let http = ValidationClients::from_endpoints(&config.monitors);
    let clients = ValidationClients::new(http.images, http.infra, vms);
    app_with(store, config, clients)
}

/// VM status source with a fixed answer.
pub struct FixedVm(pub LookupResult<VmMetrics>);

#[async_trait]
impl VmStatusSource for FixedVm {
    async fn vm_status(&self, _vm_id: &str) -> LookupResult<VmMetrics> {
        self.0.clone()
    }
}

pub fn missing_vm() -> Arc<dyn VmStatusSource> {
    Arc::new(FixedVm(Err(LookupError::NotFound("get vm metrics".into()))))
}

pub fn vm_in_state(power_state: &str) -> Arc<dyn VmStatusSource> {
    Arc::new(FixedVm(Ok(VmMetrics {
        vm_id: Some("vm-1".into()),
        power_state: power_state.into(),
        extra: Default::default(),
    })))
}

pub fn request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", TOKEN)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap()
}

pub async fn extract_json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn deploy_body(name: &str, count: i64) -> String {
    serde_json::json!({
        "destination": { "clusterId": "prod", "hostId": "esx-01" },
        "imageSource": { "imageId": "img-1" },
        "vmConfig": { "name": name, "numberOfVms": count }
    })
    .to_string()
}
