//! Pre-flight validation of requested VM operations.
//!
//! Deploys are checked against the image catalog and the health of the
//! target host and cluster. Operations on an existing VM are checked
//! against the VM's runtime state under one of two policies, see
//! [`VmValidationPolicy`].

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use monitor_api::VmMetrics;
use tracing::{debug, info, warn};
use vmr_db::models::VmOperation;

use crate::clients::{LookupError, LookupResult, ValidationClients};
use crate::error::{PipelineError, Result};

/// How lookups of an existing VM behave when the VM monitor is slow or
/// failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmValidationPolicy {
    /// Lookup failures reject the request. A missing VM is reported as not
    /// found.
    Strict,
    /// A lookup that runs out of time passes. Every other lookup failure
    /// rejects the request with a validation failure.
    BestEffort,
}

impl FromStr for VmValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown vm validation policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Global switch. When off every request proceeds without lookups.
    pub enabled: bool,
    pub vm_policy: VmValidationPolicy,
    pub strict_vm_timeout: Duration,
    pub best_effort_vm_timeout: Duration,
    /// Bound for each image, host and cluster lookup.
    pub lookup_timeout: Duration,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            vm_policy: VmValidationPolicy::Strict,
            strict_vm_timeout: Duration::from_secs(60),
            best_effort_vm_timeout: Duration::from_millis(10),
            lookup_timeout: Duration::from_secs(30),
        }
    }
}

/// Deploy placement as referenced by the incoming request.
#[derive(Debug, Clone, Copy)]
pub struct DeployTarget<'a> {
    pub image_id: &'a str,
    pub host: &'a str,
    pub cluster: &'a str,
}

/// Outcome of a deploy check that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub filename: String,
}

pub struct PreflightValidator {
    clients: ValidationClients,
    config: ValidationConfig,
}

impl PreflightValidator {
    pub fn new(clients: ValidationClients, config: ValidationConfig) -> Self {
        Self { clients, config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Check that the image exists and that host and cluster report `OK`.
    ///
    /// Returns `None` when validation is disabled, otherwise the resolved
    /// image.
    pub async fn validate_deploy(&self, target: DeployTarget<'_>) -> Result<Option<ResolvedImage>> {
        if !self.config.enabled {
            debug!("pre-flight validation disabled, skipping deploy checks");
            return Ok(None);
        }

        let (image, (), ()) = tokio::try_join!(
            self.check_image(target.image_id),
            self.check_host(target.host),
            self.check_cluster(target.cluster),
        )?;

        info!(
            image_id = target.image_id,
            host = target.host,
            cluster = target.cluster,
            "deploy pre-flight checks passed"
        );
        Ok(Some(image))
    }

    /// Check an operation against the current state of an existing VM.
    pub async fn validate_vm(&self, vm_id: &str, operation: VmOperation) -> Result<()> {
        if !self.config.enabled {
            debug!(vm_id, %operation, "pre-flight validation disabled, skipping vm check");
            return Ok(());
        }

        match self.config.vm_policy {
            VmValidationPolicy::Strict => self.validate_vm_strict(vm_id, operation).await,
            VmValidationPolicy::BestEffort => self.validate_vm_best_effort(vm_id, operation).await,
        }
    }

    async fn validate_vm_strict(&self, vm_id: &str, operation: VmOperation) -> Result<()> {
        let limit = self.config.strict_vm_timeout;
        let status = match tokio::time::timeout(limit, self.clients.vms.vm_status(vm_id)).await {
            Ok(Ok(status)) => status,
            Ok(Err(LookupError::NotFound(_))) => {
                warn!(vm_id, "vm not found during validation");
                return Err(PipelineError::NotFound(format!("VM {vm_id} not found")));
            }
            Ok(Err(e)) => {
                warn!(vm_id, error = %e, "vm lookup failed");
                return Err(PipelineError::DependencyUnavailable(format!(
                    "vm-monitor lookup failed: {e}"
                )));
            }
            Err(_) => {
                warn!(vm_id, ?limit, "vm lookup timed out");
                return Err(PipelineError::DependencyUnavailable(format!(
                    "vm-monitor did not answer within {limit:?}"
                )));
            }
        };
        check_power_state(vm_id, operation, &status)
    }

    async fn validate_vm_best_effort(&self, vm_id: &str, operation: VmOperation) -> Result<()> {
        let limit = self.config.best_effort_vm_timeout;
        match tokio::time::timeout(limit, self.clients.vms.vm_status(vm_id)).await {
            Ok(Ok(status)) => check_power_state(vm_id, operation, &status),
            Ok(Err(LookupError::Timeout)) | Err(_) => {
                warn!(vm_id, ?limit, "vm lookup timed out, letting request through");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(vm_id, error = %e, "vm lookup failed");
                Err(PipelineError::ValidationFailed("VM validation failed".into()))
            }
        }
    }

    async fn check_image(&self, image_id: &str) -> Result<ResolvedImage> {
        let images = self
            .lookup("image-manager", self.clients.images.list_images())
            .await?;
        match images.into_iter().find(|image| image.id == image_id) {
            Some(image) => Ok(ResolvedImage {
                filename: image.filename,
            }),
            None => {
                warn!(image_id, "image not found");
                Err(PipelineError::ValidationFailed(format!(
                    "image {image_id} not found"
                )))
            }
        }
    }

    async fn check_host(&self, host: &str) -> Result<()> {
        let hosts = self
            .lookup("infra-monitor", self.clients.infra.list_hosts())
            .await?;
        let entry = hosts.iter().find(|h| h.host_name == host);
        require_ok("host", host, entry.map(|h| h.status.as_str()))
    }

    async fn check_cluster(&self, cluster: &str) -> Result<()> {
        let clusters = self
            .lookup("infra-monitor", self.clients.infra.list_clusters())
            .await?;
        let entry = clusters.iter().find(|c| c.cluster_name == cluster);
        require_ok("cluster", cluster, entry.map(|c| c.status.as_str()))
    }

    async fn lookup<T>(
        &self,
        service: &str,
        fut: impl Future<Output = LookupResult<T>>,
    ) -> Result<T> {
        let limit = self.config.lookup_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(service, error = %e, "validation lookup failed");
                Err(PipelineError::DependencyUnavailable(format!(
                    "{service} lookup failed: {e}"
                )))
            }
            Err(_) => {
                warn!(service, ?limit, "validation lookup timed out");
                Err(PipelineError::DependencyUnavailable(format!(
                    "{service} did not answer within {limit:?}"
                )))
            }
        }
    }
}

fn require_ok(kind: &str, name: &str, status: Option<&str>) -> Result<()> {
    match status {
        Some(status) if status.eq_ignore_ascii_case("OK") => Ok(()),
        Some(status) => {
            warn!(kind, placement = name, status, "placement target not healthy");
            Err(PipelineError::ValidationFailed(format!(
                "{kind} {name} is not healthy"
            )))
        }
        None => {
            warn!(kind, placement = name, "placement target not found");
            Err(PipelineError::ValidationFailed(format!("{kind} {name} not found")))
        }
    }
}

/// A powered-off VM cannot be reconfigured.
fn check_power_state(vm_id: &str, operation: VmOperation, status: &VmMetrics) -> Result<()> {
    if operation == VmOperation::Reconfigure && is_powered_off(&status.power_state) {
        warn!(vm_id, power_state = %status.power_state, "vm is powered off and cannot be reconfigured");
        return Err(PipelineError::ValidationFailed(
            "VM is powered off and cannot be reconfigured".into(),
        ));
    }
    debug!(vm_id, power_state = %status.power_state, "vm validated");
    Ok(())
}

fn is_powered_off(power_state: &str) -> bool {
    let normalized: String = power_state
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    matches!(normalized.as_str(), "POWEROFF" | "POWEREDOFF" | "OFF")
}
