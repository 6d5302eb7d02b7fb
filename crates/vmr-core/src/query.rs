use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};
use uuid::Uuid;
use vmr_db::models::{VmDeployInstance, VmRequest};
use vmr_db::{RequestStore, StoreError};

use crate::admission::bounded;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct RequestWithInstances {
    pub request: VmRequest,
    pub instances: Vec<VmDeployInstance>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestListing {
    pub requests: Vec<VmRequest>,
    pub instances: Vec<VmDeployInstance>,
}

impl RequestListing {
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// Read side of the request store.
pub struct RequestQueryService {
    store: Arc<dyn RequestStore>,
    store_timeout: Duration,
}

impl RequestQueryService {
    pub fn new(store: Arc<dyn RequestStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Fetch one request and its deploy instances. A missing request is
    /// [`PipelineError::NotFound`]; a request without instances is not.
    pub async fn get_request(&self, request_id: Uuid) -> Result<RequestWithInstances> {
        let request = match bounded(self.store_timeout, self.store.get_request(request_id)).await {
            Ok(request) => request,
            Err(PipelineError::Storage(StoreError::NotFound)) => {
                debug!(%request_id, "vm request not found");
                return Err(PipelineError::NotFound(format!(
                    "VM request {request_id} not found"
                )));
            }
            Err(e) => {
                error!(%request_id, error = %e, "failed to fetch vm request");
                return Err(e);
            }
        };

        let instances = empty_if_missing(
            bounded(
                self.store_timeout,
                self.store.list_deploy_instances(request_id),
            )
            .await,
        )
        .inspect_err(|e| error!(%request_id, error = %e, "failed to fetch deploy instances"))?;

        Ok(RequestWithInstances { request, instances })
    }

    /// Every request and every deploy instance.
    pub async fn list_requests(&self) -> Result<RequestListing> {
        let (requests, instances) = tokio::join!(
            bounded(self.store_timeout, self.store.list_requests()),
            bounded(self.store_timeout, self.store.list_all_deploy_instances()),
        );
        let requests = empty_if_missing(requests)
            .inspect_err(|e| error!(error = %e, "failed to list vm requests"))?;
        let instances = empty_if_missing(instances)
            .inspect_err(|e| error!(error = %e, "failed to list deploy instances"))?;

        debug!(
            requests = requests.len(),
            instances = instances.len(),
            "listed vm requests"
        );
        Ok(RequestListing {
            requests,
            instances,
        })
    }
}

fn empty_if_missing<T>(result: Result<Vec<T>>) -> Result<Vec<T>> {
    match result {
        Err(PipelineError::Storage(StoreError::NotFound)) => Ok(Vec::new()),
        other => other,
    }
}
