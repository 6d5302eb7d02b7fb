use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};
use vmr_db::RequestStore;
use vmr_db::models::VmOperation;

use crate::admission::{
    Admission, AdmittedRequest, AdmitterConfig, RequestAdmitter, RequestScope, check_vm_count,
};
use crate::clients::ValidationClients;
use crate::error::{PipelineError, Result};
use crate::payload::{DeployVmRequest, VmOperationRequest};
use crate::preflight::{DeployTarget, PreflightValidator, ValidationConfig};
use crate::query::RequestQueryService;

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub validation: ValidationConfig,
    pub admission: AdmitterConfig,
}

/// Validate then persist incoming VM requests, and read them back.
#[derive(Clone)]
pub struct AdmissionPipeline {
    validator: Arc<PreflightValidator>,
    admitter: Arc<RequestAdmitter>,
    queries: Arc<RequestQueryService>,
}

impl AdmissionPipeline {
    pub fn new(
        clients: ValidationClients,
        store: Arc<dyn RequestStore>,
        config: PipelineConfig,
    ) -> Self {
        let store_timeout: Duration = config.admission.store_timeout;
        Self {
            validator: Arc::new(PreflightValidator::new(clients, config.validation)),
            admitter: Arc::new(RequestAdmitter::new(store.clone(), config.admission)),
            queries: Arc::new(RequestQueryService::new(store, store_timeout)),
        }
    }

    pub fn queries(&self) -> &RequestQueryService {
        &self.queries
    }

    /// Validate and persist a deploy. When validation runs, the image
    /// filename from the catalog is written into the stored payload.
    #[instrument(skip_all, fields(vm_name = %req.vm_config.name))]
    pub async fn deploy(
        &self,
        mut req: DeployVmRequest,
        scope: &RequestScope,
    ) -> Result<AdmittedRequest> {
        check_vm_count(
            req.vm_config.number_of_vms.unwrap_or(0),
            self.admitter.config().max_vms_per_deploy,
        )?;

        if self.validator.config().enabled {
            let target = DeployTarget {
                image_id: required(req.image_source.image_id.as_deref(), "imageSource.imageId")?,
                host: required(req.destination.host_id.as_deref(), "destination.hostId")?,
                cluster: required(req.destination.cluster_id.as_deref(), "destination.clusterId")?,
            };
            let resolved = self.validator.validate_deploy(target).await?;
            if let Some(image) = resolved {
                req.image_source.image_name = Some(image.filename);
            }
        }

        let metadata = serde_json::to_string(&req)
            .map_err(|e| PipelineError::Internal(format!("failed to encode deploy request: {e}")))?;
        let admitted = self
            .admitter
            .admit(Admission::new(VmOperation::Deploy, &metadata, scope))
            .await?;
        info!(
            request_id = %admitted.request.request_id,
            instances = admitted.instances.len(),
            "deploy request admitted"
        );
        Ok(admitted)
    }

    /// Validate and persist an operation on an existing VM.
    #[instrument(skip_all, fields(operation = %operation, vm_id = %req.vm_id))]
    pub async fn submit(
        &self,
        operation: VmOperation,
        req: VmOperationRequest,
        scope: &RequestScope,
    ) -> Result<AdmittedRequest> {
        if operation == VmOperation::Deploy {
            return Err(PipelineError::Internal(
                "deploy requests carry a deploy payload".into(),
            ));
        }

        if matches!(req.vm_id.as_str(), "" | "." | "..") {
            return Err(PipelineError::ValidationFailed(format!(
                "vmId {:?} does not name a vm",
                req.vm_id
            )));
        }
        self.validator.validate_vm(&req.vm_id, operation).await?;

        let metadata = serde_json::to_string(&req).map_err(|e| {
            PipelineError::Internal(format!("failed to encode {operation} request: {e}"))
        })?;
        let admitted = self
            .admitter
            .admit(Admission::new(operation, &metadata, scope))
            .await?;
        info!(request_id = %admitted.request.request_id, "vm request admitted");
        Ok(admitted)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PipelineError::ValidationFailed(format!(
            "{field} is required"
        ))),
    }
}
