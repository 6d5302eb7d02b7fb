//! Persisting accepted requests.
//!
//! Every admitted request becomes one row in the request table. Deploys
//! also get one instance row per VM to be created, named `<name>_<n>`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};
use vmr_db::models::{
    InstanceStatus, NewDeployInstance, NewVmRequest, RequestStatus, VmDeployInstance, VmOperation,
    VmRequest,
};
use vmr_db::{RequestStore, StoreError};

use crate::error::{PipelineError, Result};

/// Tenant scope stamped onto every request row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestScope {
    pub workspace_id: String,
    pub datacenter_id: String,
}

/// One request to persist.
#[derive(Debug, Clone, Copy)]
pub struct Admission<'a> {
    pub operation: VmOperation,
    pub status: RequestStatus,
    /// Serialized operation payload, stored verbatim.
    pub metadata: &'a str,
    pub scope: &'a RequestScope,
}

impl<'a> Admission<'a> {
    pub fn new(operation: VmOperation, metadata: &'a str, scope: &'a RequestScope) -> Self {
        Self {
            operation,
            status: RequestStatus::New,
            metadata,
            scope,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmittedRequest {
    pub request: VmRequest,
    pub instances: Vec<VmDeployInstance>,
}

/// The part of a deploy payload that drives instance creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployExtension {
    vm_config: DeployExtensionVmConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployExtensionVmConfig {
    name: String,
    #[serde(default)]
    number_of_vms: Option<i64>,
}

/// Instance rows for a deploy payload. A missing or non-positive VM count
/// yields no rows; a count above `max_vms` is rejected.
pub fn plan_deploy_instances(metadata: &str, max_vms: u32) -> Result<Vec<NewDeployInstance>> {
    let ext: DeployExtension = serde_json::from_str(metadata)?;
    let count = ext.vm_config.number_of_vms.unwrap_or(0).max(0);
    check_vm_count(count, max_vms)?;
    Ok(instance_names(&ext.vm_config.name, count)
        .map(|vm_name| NewDeployInstance {
            vm_name,
            vm_status: InstanceStatus::Init,
        })
        .collect())
}

/// Reject a deploy asking for more VMs than `max_vms`.
pub fn check_vm_count(count: i64, max_vms: u32) -> Result<()> {
    if count > i64::from(max_vms) {
        return Err(PipelineError::ValidationFailed(format!(
            "numberOfVms {count} exceeds the limit of {max_vms}"
        )));
    }
    Ok(())
}

fn instance_names(base: &str, count: i64) -> impl Iterator<Item = String> + '_ {
    (1..=count).map(move |n| format!("{base}_{n}"))
}

#[derive(Debug, Clone)]
pub struct AdmitterConfig {
    /// Bound applied to every individual store call.
    pub store_timeout: Duration,
    /// Write a deploy and its instances in one transaction instead of two
    /// separate writes.
    pub atomic: bool,
    /// Largest `numberOfVms` a single deploy may ask for.
    pub max_vms_per_deploy: u32,
}

impl Default for AdmitterConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(10),
            atomic: false,
            max_vms_per_deploy: 1000,
        }
    }
}

pub struct RequestAdmitter {
    store: Arc<dyn RequestStore>,
    config: AdmitterConfig,
}

impl RequestAdmitter {
    pub fn new(store: Arc<dyn RequestStore>, config: AdmitterConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AdmitterConfig {
        &self.config
    }

    /// Persist a request, plus its instance rows for a deploy.
    ///
    /// In the default two-write mode a failure after the request row is
    /// written leaves that row in place without instances.
    pub async fn admit(&self, admission: Admission<'_>) -> Result<AdmittedRequest> {
        let new = NewVmRequest {
            operation: admission.operation,
            request_status: admission.status,
            workspace_id: &admission.scope.workspace_id,
            datacenter_id: &admission.scope.datacenter_id,
            request_metadata: admission.metadata,
        };

        if admission.operation == VmOperation::Deploy && self.config.atomic {
            return self.admit_deploy_atomic(&new).await;
        }

        let request = bounded(self.config.store_timeout, self.store.create_request(&new))
            .await
            .inspect_err(|e| {
                error!(operation = %admission.operation, error = %e, "failed to create vm request")
            })?;
        info!(
            request_id = %request.request_id,
            operation = %request.operation,
            "vm request created"
        );

        if admission.operation != VmOperation::Deploy {
            return Ok(AdmittedRequest {
                request,
                instances: Vec::new(),
            });
        }

        let planned = plan_deploy_instances(admission.metadata, self.config.max_vms_per_deploy)
            .inspect_err(|e| {
            error!(
                request_id = %request.request_id,
                error = %e,
                "deploy payload unreadable, request left without instances"
            )
        })?;
        if planned.is_empty() {
            warn!(request_id = %request.request_id, "deploy request asks for no vms");
            return Ok(AdmittedRequest {
                request,
                instances: Vec::new(),
            });
        }

        let instances = bounded(
            self.config.store_timeout,
            self.store
                .create_deploy_instances(request.request_id, &planned),
        )
        .await
        .inspect_err(|e| {
            error!(
                request_id = %request.request_id,
                error = %e,
                "failed to create deploy instances, request left without instances"
            )
        })?;
        info!(
            request_id = %request.request_id,
            count = instances.len(),
            "deploy instances created"
        );

        Ok(AdmittedRequest { request, instances })
    }

    async fn admit_deploy_atomic(&self, new: &NewVmRequest<'_>) -> Result<AdmittedRequest> {
        let planned = plan_deploy_instances(new.request_metadata, self.config.max_vms_per_deploy)
            .inspect_err(|e| error!(error = %e, "deploy payload unreadable"))?;
        let (request, instances) = bounded(
            self.config.store_timeout,
            self.store.create_request_with_instances(new, &planned),
        )
        .await
        .inspect_err(|e| error!(error = %e, "failed to create deploy request"))?;
        info!(
            request_id = %request.request_id,
            count = instances.len(),
            "deploy request and instances created"
        );
        Ok(AdmittedRequest { request, instances })
    }
}

/// Run a store call under a deadline.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = vmr_db::store::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => Err(PipelineError::Storage(StoreError::Unavailable(format!(
            "store call exceeded {limit:?}"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_names_are_one_based() {
        let planned =
            plan_deploy_instances(r#"{"vmConfig":{"name":"web","numberOfVms":3}}"#, 10).unwrap();
        let names: Vec<_> = planned.iter().map(|i| i.vm_name.as_str()).collect();
        assert_eq!(names, ["web_1", "web_2", "web_3"]);
        assert!(planned.iter().all(|i| i.vm_status == InstanceStatus::Init));
    }

    #[test]
    fn missing_or_negative_count_plans_nothing() {
        assert!(plan_deploy_instances(r#"{"vmConfig":{"name":"web"}}"#, 10).unwrap().is_empty());
        assert!(
            plan_deploy_instances(r#"{"vmConfig":{"name":"web","numberOfVms":-2}}"#, 10)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn unreadable_payload_is_malformed_input() {
        for metadata in ["not json", r#"{"vmConfig":{}}"#, r#"{"other":1}"#] {
            assert!(matches!(
                plan_deploy_instances(metadata, 10),
                Err(PipelineError::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn count_above_limit_is_rejected_without_planning() {
        let metadata = r#"{"vmConfig":{"name":"web","numberOfVms":1000000000000}}"#;
        assert!(matches!(
            plan_deploy_instances(metadata, 1000),
            Err(PipelineError::ValidationFailed(_))
        ));
        assert_eq!(
            plan_deploy_instances(r#"{"vmConfig":{"name":"web","numberOfVms":4}}"#, 4)
                .unwrap()
                .len(),
            4
        );
    }
}
