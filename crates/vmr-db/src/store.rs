use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{NewDeployInstance, NewVmRequest, VmDeployInstance, VmRequest};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable storage for VM requests and their deploy instances.
///
/// Reads on a missing request report [`StoreError::NotFound`]; list reads
/// on empty tables return empty vectors.
#[async_trait]
pub trait RequestStore: Send + Sync + 'static {
    /// Write one request row. The returned row carries the assigned id.
    async fn create_request(&self, req: &NewVmRequest<'_>) -> Result<VmRequest>;

    /// Write the instance rows of an already persisted request.
    async fn create_deploy_instances(
        &self,
        request_id: Uuid,
        instances: &[NewDeployInstance],
    ) -> Result<Vec<VmDeployInstance>>;

    /// Write a request and its instance rows as one unit: either all rows
    /// become visible or none do.
    async fn create_request_with_instances(
        &self,
        req: &NewVmRequest<'_>,
        instances: &[NewDeployInstance],
    ) -> Result<(VmRequest, Vec<VmDeployInstance>)>;

    async fn get_request(&self, request_id: Uuid) -> Result<VmRequest>;

    async fn list_deploy_instances(&self, request_id: Uuid) -> Result<Vec<VmDeployInstance>>;

    async fn list_requests(&self) -> Result<Vec<VmRequest>>;

    async fn list_all_deploy_instances(&self) -> Result<Vec<VmDeployInstance>>;
}

/// [`RequestStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    #[instrument(skip_all, fields(operation = %req.operation))]
    async fn create_request(&self, req: &NewVmRequest<'_>) -> Result<VmRequest> {
        let row = VmRequest::insert(&self.pool, req).await?;
        tracing::debug!(request_id = %row.request_id, "vm request row written");
        Ok(row)
    }

    #[instrument(skip(self, instances), fields(count = instances.len()))]
    async fn create_deploy_instances(
        &self,
        request_id: Uuid,
        instances: &[NewDeployInstance],
    ) -> Result<Vec<VmDeployInstance>> {
        let mut tx = self.pool.begin().await?;
        let rows = VmDeployInstance::insert_many(&mut tx, request_id, instances).await?;
        tx.commit().await?;
        Ok(rows)
    }

    #[instrument(skip_all, fields(operation = %req.operation, count = instances.len()))]
    async fn create_request_with_instances(
        &self,
        req: &NewVmRequest<'_>,
        instances: &[NewDeployInstance],
    ) -> Result<(VmRequest, Vec<VmDeployInstance>)> {
        let mut tx = self.pool.begin().await?;
        let row = VmRequest::insert(&mut *tx, req).await?;
        let children = VmDeployInstance::insert_many(&mut *tx, row.request_id, instances).await?;
        tx.commit().await?;
        Ok((row, children))
    }

    async fn get_request(&self, request_id: Uuid) -> Result<VmRequest> {
        VmRequest::get_by_id(&self.pool, request_id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn list_deploy_instances(&self, request_id: Uuid) -> Result<Vec<VmDeployInstance>> {
        Ok(VmDeployInstance::list_for_request(&self.pool, request_id).await?)
    }

    async fn list_requests(&self) -> Result<Vec<VmRequest>> {
        Ok(VmRequest::list(&self.pool).await?)
    }

    async fn list_all_deploy_instances(&self) -> Result<Vec<VmDeployInstance>> {
        Ok(VmDeployInstance::list(&self.pool).await?)
    }
}
