//! In-memory [`RequestStore`] for tests and local runs.
//!
//! Mirrors the PostgreSQL schema constraints that matter to callers:
//! instance rows need an existing parent and `(request_id, vm_name)` is
//! unique. Individual write and read paths can be made to fail.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{NewDeployInstance, NewVmRequest, VmDeployInstance, VmRequest};
use crate::store::{RequestStore, Result, StoreError};

#[derive(Default)]
struct Tables {
    requests: Vec<VmRequest>,
    instances: Vec<VmDeployInstance>,
    instance_keys: HashSet<(Uuid, String)>,
}

impl Tables {
    fn insert_instances(&mut self, rows: &[VmDeployInstance]) {
        for row in rows {
            self.instance_keys.insert((row.request_id, row.vm_name.clone()));
        }
        self.instances.extend(rows.iter().cloned());
    }
}

#[derive(Default)]
struct Faults {
    request_writes: AtomicBool,
    instance_writes: AtomicBool,
    instance_reads: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryRequestStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
    writes: Arc<AtomicUsize>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_request_writes(&self, fail: bool) {
        self.faults.request_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_instance_writes(&self, fail: bool) {
        self.faults.instance_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_instance_reads(&self, fail: bool) {
        self.faults.instance_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful write calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {what} failure")));
        }
        Ok(())
    }

    fn build_request(req: &NewVmRequest<'_>) -> VmRequest {
        VmRequest {
            request_id: Uuid::new_v4(),
            operation: req.operation,
            request_status: req.request_status,
            workspace_id: req.workspace_id.to_string(),
            datacenter_id: req.datacenter_id.to_string(),
            created_at: Utc::now(),
            completed_at: None,
            request_metadata: req.request_metadata.to_string(),
        }
    }

    fn build_instances(
        tables: &Tables,
        request_id: Uuid,
        instances: &[NewDeployInstance],
    ) -> Result<Vec<VmDeployInstance>> {
        let mut rows: Vec<VmDeployInstance> = Vec::with_capacity(instances.len());
        let mut batch: HashSet<&str> = HashSet::with_capacity(instances.len());
        for instance in instances {
            let key = (request_id, instance.vm_name.clone());
            if tables.instance_keys.contains(&key) || !batch.insert(instance.vm_name.as_str()) {
                return Err(StoreError::Constraint(format!(
                    "duplicate instance {request_id}/{}",
                    instance.vm_name
                )));
            }
            rows.push(VmDeployInstance {
                request_id,
                vm_name: instance.vm_name.clone(),
                vm_id: String::new(),
                vm_status: instance.vm_status,
                vm_state_message: String::new(),
                completed_at: None,
            });
        }
        Ok(rows)
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn create_request(&self, req: &NewVmRequest<'_>) -> Result<VmRequest> {
        Self::check(&self.faults.request_writes, "request write")?;
        let row = Self::build_request(req);
        self.tables.write().await.requests.push(row.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn create_deploy_instances(
        &self,
        request_id: Uuid,
        instances: &[NewDeployInstance],
    ) -> Result<Vec<VmDeployInstance>> {
        Self::check(&self.faults.instance_writes, "instance write")?;
        let mut tables = self.tables.write().await;
        if !tables.requests.iter().any(|r| r.request_id == request_id) {
            return Err(StoreError::Constraint(format!(
                "no parent request {request_id}"
            )));
        }
        let rows = Self::build_instances(&tables, request_id, instances)?;
        tables.insert_instances(&rows);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(rows)
    }

    async fn create_request_with_instances(
        &self,
        req: &NewVmRequest<'_>,
        instances: &[NewDeployInstance],
    ) -> Result<(VmRequest, Vec<VmDeployInstance>)> {
        Self::check(&self.faults.request_writes, "request write")?;
        if !instances.is_empty() {
            Self::check(&self.faults.instance_writes, "instance write")?;
        }
        let mut tables = self.tables.write().await;
        let row = Self::build_request(req);
        let children = Self::build_instances(&tables, row.request_id, instances)?;
        tables.requests.push(row.clone());
        tables.insert_instances(&children);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok((row, children))
    }

    async fn get_request(&self, request_id: Uuid) -> Result<VmRequest> {
        self.tables
            .read()
            .await
            .requests
            .iter()
            .find(|r| r.request_id == request_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_deploy_instances(&self, request_id: Uuid) -> Result<Vec<VmDeployInstance>> {
        Self::check(&self.faults.instance_reads, "instance read")?;
        Ok(self
            .tables
            .read()
            .await
            .instances
            .iter()
            .filter(|i| i.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn list_requests(&self) -> Result<Vec<VmRequest>> {
        Ok(self.tables.read().await.requests.clone())
    }

    async fn list_all_deploy_instances(&self) -> Result<Vec<VmDeployInstance>> {
        Self::check(&self.faults.instance_reads, "instance read")?;
        Ok(self.tables.read().await.instances.clone())
    }
}
