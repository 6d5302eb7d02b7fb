//! Lookups against the services consulted during pre-flight validation.
//!
//! Each service sits behind its own trait so the validator can be driven by
//! the real HTTP clients in production and by in-process fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;
use monitor_api::{
    HypervisorCluster, HypervisorHost, HypervisorImage, ImageManagerClient, InfraMonitorClient,
    VmMetrics, VmMonitorClient,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    #[error("lookup timed out")]
    Timeout,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

impl From<monitor_api::Error> for LookupError {
    fn from(err: monitor_api::Error) -> Self {
        if err.is_timeout() {
            return LookupError::Timeout;
        }
        match err {
            monitor_api::Error::NotFound { endpoint } => LookupError::NotFound(endpoint.to_string()),
            other => LookupError::Failed(other.to_string()),
        }
    }
}

pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Catalog of deployable images.
#[async_trait]
pub trait ImageCatalog: Send + Sync + 'static {
    async fn list_images(&self) -> LookupResult<Vec<HypervisorImage>>;
}

/// Health of hypervisor hosts and clusters.
#[async_trait]
pub trait InfraStatus: Send + Sync + 'static {
    async fn list_hosts(&self) -> LookupResult<Vec<HypervisorHost>>;

    async fn list_clusters(&self) -> LookupResult<Vec<HypervisorCluster>>;
}

/// Runtime state of existing VMs.
#[async_trait]
pub trait VmStatusSource: Send + Sync + 'static {
    /// An unknown VM is [`LookupError::NotFound`].
    async fn vm_status(&self, vm_id: &str) -> LookupResult<VmMetrics>;
}

#[async_trait]
impl ImageCatalog for ImageManagerClient {
    async fn list_images(&self) -> LookupResult<Vec<HypervisorImage>> {
        Ok(ImageManagerClient::list_images(self).await?)
    }
}

#[async_trait]
impl InfraStatus for InfraMonitorClient {
    async fn list_hosts(&self) -> LookupResult<Vec<HypervisorHost>> {
        Ok(InfraMonitorClient::list_hosts(self).await?)
    }

    async fn list_clusters(&self) -> LookupResult<Vec<HypervisorCluster>> {
        Ok(InfraMonitorClient::list_clusters(self).await?)
    }
}

#[async_trait]
impl VmStatusSource for VmMonitorClient {
    async fn vm_status(&self, vm_id: &str) -> LookupResult<VmMetrics> {
        Ok(self.get_vm_metrics(vm_id).await?)
    }
}

/// Base URLs and credentials of the validation services.
#[derive(Debug, Clone)]
pub struct MonitorEndpoints {
    pub image_manager_url: String,
    pub infra_monitor_url: String,
    pub vm_monitor_url: String,
    pub token: Option<String>,
}

/// The set of validation service clients handed to the validator.
#[derive(Clone)]
pub struct ValidationClients {
    pub images: Arc<dyn ImageCatalog>,
    pub infra: Arc<dyn InfraStatus>,
    pub vms: Arc<dyn VmStatusSource>,
}

impl ValidationClients {
    pub fn new(
        images: Arc<dyn ImageCatalog>,
        infra: Arc<dyn InfraStatus>,
        vms: Arc<dyn VmStatusSource>,
    ) -> Self {
        Self { images, infra, vms }
    }

    /// Build HTTP clients for every validation service.
    pub fn from_endpoints(endpoints: &MonitorEndpoints) -> Self {
        tracing::info!(
            image_manager = %endpoints.image_manager_url,
            infra_monitor = %endpoints.infra_monitor_url,
            vm_monitor = %endpoints.vm_monitor_url,
            "configured validation service clients"
        );
        let token = endpoints.token.clone();
        Self {
            images: Arc::new(ImageManagerClient::new(
                endpoints.image_manager_url.as_str(),
                token.clone(),
            )),
            infra: Arc::new(InfraMonitorClient::new(
                endpoints.infra_monitor_url.as_str(),
                token.clone(),
            )),
            vms: Arc::new(VmMonitorClient::new(endpoints.vm_monitor_url.as_str(), token)),
        }
    }
}
