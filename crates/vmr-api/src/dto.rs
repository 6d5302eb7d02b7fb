use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vmr_core::{RequestListing, RequestWithInstances};
use vmr_db::models::{InstanceStatus, RequestStatus, VmDeployInstance, VmOperation, VmRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRequestResponse {
    pub request_id: Uuid,
    pub operation: VmOperation,
    pub request_status: RequestStatus,
    pub workspace_id: String,
    pub datacenter_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub request_metadata: String,
}

impl From<VmRequest> for VmRequestResponse {
    fn from(r: VmRequest) -> Self {
        Self {
            request_id: r.request_id,
            operation: r.operation,
            request_status: r.request_status,
            workspace_id: r.workspace_id,
            datacenter_id: r.datacenter_id,
            created_at: r.created_at,
            completed_at: r.completed_at,
            request_metadata: r.request_metadata,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDeployInstanceResponse {
    pub request_id: Uuid,
    pub vm_id: String,
    pub vm_name: String,
    pub vm_status: InstanceStatus,
    pub vm_state_message: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<VmDeployInstance> for VmDeployInstanceResponse {
    fn from(i: VmDeployInstance) -> Self {
        Self {
            request_id: i.request_id,
            vm_id: i.vm_id,
            vm_name: i.vm_name,
            vm_status: i.vm_status,
            vm_state_message: i.vm_state_message,
            completed_at: i.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRequestWithDeploy {
    pub vm_request: VmRequestResponse,
    pub vm_deploy_list: Vec<VmDeployInstanceResponse>,
}

impl From<RequestWithInstances> for VmRequestWithDeploy {
    fn from(found: RequestWithInstances) -> Self {
        Self {
            vm_request: found.request.into(),
            vm_deploy_list: found.instances.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRequestsList {
    pub vm_requests_list_count: usize,
    pub vm_deploy_list_count: usize,
    pub items: VmRequestsListItems,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRequestsListItems {
    pub vm_requests_list: Vec<VmRequestResponse>,
    pub vm_deploy_list: Vec<VmDeployInstanceResponse>,
}

impl From<RequestListing> for VmRequestsList {
    fn from(listing: RequestListing) -> Self {
        Self {
            vm_requests_list_count: listing.request_count(),
            vm_deploy_list_count: listing.instance_count(),
            items: VmRequestsListItems {
                vm_requests_list: listing.requests.into_iter().map(Into::into).collect(),
                vm_deploy_list: listing.instances.into_iter().map(Into::into).collect(),
            },
        }
    }
}
