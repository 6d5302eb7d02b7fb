//! Shared fakes for the pipeline tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use monitor_api::{HypervisorCluster, HypervisorHost, HypervisorImage, VmMetrics};
use uuid::Uuid;
use vmr_core::clients::{ImageCatalog, InfraStatus, LookupError, LookupResult, VmStatusSource};
use vmr_core::payload::{DeployVmRequest, Destination, ImageSource, VmConfig};
use vmr_core::{
    AdmissionPipeline, AdmitterConfig, PipelineConfig, ValidationClients, ValidationConfig,
    VmValidationPolicy,
};
use vmr_db::memory::MemoryRequestStore;
use vmr_db::models::{NewDeployInstance, NewVmRequest, VmDeployInstance, VmRequest};
use vmr_db::store::Result as StoreResult;
use vmr_db::RequestStore;

/// Canned answer of a fake lookup.
#[derive(Clone)]
pub enum Reply<T> {
    Ok(T),
    Err(LookupError),
    /// Sleep, then answer.
    Slow(Duration, T),
}

impl<T: Clone> Reply<T> {
    async fn resolve(&self) -> LookupResult<T> {
        match self {
            Reply::Ok(v) => Ok(v.clone()),
            Reply::Err(e) => Err(e.clone()),
            Reply::Slow(delay, v) => {
                tokio::time::sleep(*delay).await;
                Ok(v.clone())
            }
        }
    }
}

pub struct FakeImages {
    pub reply: Mutex<Reply<Vec<HypervisorImage>>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageCatalog for FakeImages {
    async fn list_images(&self) -> LookupResult<Vec<HypervisorImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        reply.resolve().await
    }
}

pub struct FakeInfra {
    pub hosts: Mutex<Reply<Vec<HypervisorHost>>>,
    pub clusters: Mutex<Reply<Vec<HypervisorCluster>>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl InfraStatus for FakeInfra {
    async fn list_hosts(&self) -> LookupResult<Vec<HypervisorHost>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.hosts.lock().unwrap().clone();
        reply.resolve().await
    }

    async fn list_clusters(&self) -> LookupResult<Vec<HypervisorCluster>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.clusters.lock().unwrap().clone();
        reply.resolve().await
    }
}

pub struct FakeVms {
    pub reply: Mutex<Reply<VmMetrics>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl VmStatusSource for FakeVms {
    async fn vm_status(&self, _vm_id: &str) -> LookupResult<VmMetrics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        reply.resolve().await
    }
}

pub fn image(id: &str, filename: &str) -> HypervisorImage {
    HypervisorImage {
        id: id.to_string(),
        filename: filename.to_string(),
        name: None,
    }
}

pub fn host(name: &str, status: &str) -> HypervisorHost {
    HypervisorHost {
        host_name: name.to_string(),
        status: status.to_string(),
    }
}

pub fn cluster(name: &str, status: &str) -> HypervisorCluster {
    HypervisorCluster {
        cluster_name: name.to_string(),
        status: status.to_string(),
    }
}

pub fn vm(power_state: &str) -> VmMetrics {
    VmMetrics {
        vm_id: Some("vm-1".to_string()),
        power_state: power_state.to_string(),
        extra: Default::default(),
    }
}

/// Fakes that answer every lookup successfully with a healthy inventory.
pub struct Fakes {
    pub images: Arc<FakeImages>,
    pub infra: Arc<FakeInfra>,
    pub vms: Arc<FakeVms>,
}

impl Fakes {
    pub fn healthy() -> Self {
        Self {
            images: Arc::new(FakeImages {
                reply: Mutex::new(Reply::Ok(vec![
                    image("img-1", "ubuntu-22.04.qcow2"),
                    image("img-2", "debian-12.qcow2"),
                ])),
                calls: AtomicUsize::new(0),
            }),
            infra: Arc::new(FakeInfra {
                hosts: Mutex::new(Reply::Ok(vec![host("esx-01", "OK"), host("esx-02", "DOWN")])),
                clusters: Mutex::new(Reply::Ok(vec![
                    cluster("prod", "OK"),
                    cluster("lab", "DEGRADED"),
                ])),
                calls: AtomicUsize::new(0),
            }),
            vms: Arc::new(FakeVms {
                reply: Mutex::new(Reply::Ok(vm("POWERED_ON"))),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn clients(&self) -> ValidationClients {
        ValidationClients::new(self.images.clone(), self.infra.clone(), self.vms.clone())
    }

    pub fn set_vm(&self, reply: Reply<VmMetrics>) {
        *self.vms.reply.lock().unwrap() = reply;
    }

    pub fn set_images(&self, reply: Reply<Vec<HypervisorImage>>) {
        *self.images.reply.lock().unwrap() = reply;
    }

    pub fn set_hosts(&self, reply: Reply<Vec<HypervisorHost>>) {
        *self.infra.hosts.lock().unwrap() = reply;
    }

    pub fn set_clusters(&self, reply: Reply<Vec<HypervisorCluster>>) {
        *self.infra.clusters.lock().unwrap() = reply;
    }

    pub fn lookup_calls(&self) -> usize {
        self.images.calls.load(Ordering::SeqCst)
            + self.infra.calls.load(Ordering::SeqCst)
            + self.vms.calls.load(Ordering::SeqCst)
    }
}

pub fn validation(enabled: bool, policy: VmValidationPolicy) -> ValidationConfig {
    ValidationConfig {
        enabled,
        vm_policy: policy,
        strict_vm_timeout: Duration::from_millis(200),
        best_effort_vm_timeout: Duration::from_millis(10),
        lookup_timeout: Duration::from_millis(200),
    }
}

pub fn pipeline_with(
    fakes: &Fakes,
    store: Arc<dyn RequestStore>,
    validation: ValidationConfig,
    atomic: bool,
) -> AdmissionPipeline {
    AdmissionPipeline::new(
        fakes.clients(),
        store,
        PipelineConfig {
            validation,
            admission: AdmitterConfig {
                store_timeout: Duration::from_millis(200),
                atomic,
                ..Default::default()
            },
        },
    )
}

pub fn pipeline(
    fakes: &Fakes,
    store: &MemoryRequestStore,
    validation: ValidationConfig,
) -> AdmissionPipeline {
    pipeline_with(fakes, Arc::new(store.clone()), validation, false)
}

pub fn deploy_request(name: &str, count: Option<i64>) -> DeployVmRequest {
    DeployVmRequest {
        destination: Destination {
            cluster_id: Some("prod".to_string()),
            host_id: Some("esx-01".to_string()),
            ..Default::default()
        },
        image_source: ImageSource {
            image_id: Some("img-1".to_string()),
            ..Default::default()
        },
        vm_config: VmConfig {
            name: name.to_string(),
            number_of_vms: count,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Store whose calls never finish in time.
pub struct StalledStore {
    pub inner: MemoryRequestStore,
    pub delay: Duration,
}

#[async_trait]
impl RequestStore for StalledStore {
    async fn create_request(&self, req: &NewVmRequest<'_>) -> StoreResult<VmRequest> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_request(req).await
    }

    async fn create_deploy_instances(
        &self,
        request_id: Uuid,
        instances: &[NewDeployInstance],
    ) -> StoreResult<Vec<VmDeployInstance>> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_deploy_instances(request_id, instances).await
    }

    async fn create_request_with_instances(
        &self,
        req: &NewVmRequest<'_>,
        instances: &[NewDeployInstance],
    ) -> StoreResult<(VmRequest, Vec<VmDeployInstance>)> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_request_with_instances(req, instances).await
    }

    async fn get_request(&self, request_id: Uuid) -> StoreResult<VmRequest> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_request(request_id).await
    }

    async fn list_deploy_instances(&self, request_id: Uuid) -> StoreResult<Vec<VmDeployInstance>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_deploy_instances(request_id).await
    }

    async fn list_requests(&self) -> StoreResult<Vec<VmRequest>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_requests().await
    }

    async fn list_all_deploy_instances(&self) -> StoreResult<Vec<VmDeployInstance>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_all_deploy_instances().await
    }
}
