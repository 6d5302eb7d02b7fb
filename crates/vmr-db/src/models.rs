use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

// ── VmOperation ─────────────────────────────────────────────────────

/// VM lifecycle operation a request asks the worker to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "vm_operation", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmOperation {
    Deploy,
    PowerOn,
    PowerOff,
    Delete,
    Reset,
    Refresh,
    RestartGuestOs,
    ShutdownGuestOs,
    Reconfigure,
}

impl VmOperation {
    pub const ALL: [VmOperation; 9] = [
        Self::Deploy,
        Self::PowerOn,
        Self::PowerOff,
        Self::Delete,
        Self::Reset,
        Self::Refresh,
        Self::RestartGuestOs,
        Self::ShutdownGuestOs,
        Self::Reconfigure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "DEPLOY",
            Self::PowerOn => "POWER_ON",
            Self::PowerOff => "POWER_OFF",
            Self::Delete => "DELETE",
            Self::Reset => "RESET",
            Self::Refresh => "REFRESH",
            Self::RestartGuestOs => "RESTART_GUEST_OS",
            Self::ShutdownGuestOs => "SHUTDOWN_GUEST_OS",
            Self::Reconfigure => "RECONFIGURE",
        }
    }
}

impl fmt::Display for VmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for VmOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

// ── Statuses ────────────────────────────────────────────────────────

/// Lifecycle status of a [`VmRequest`]. Only `New` is written here; the
/// worker owns every later transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "request_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    New,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "instance_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Init,
    InProgress,
    Deployed,
    Failed,
}

// ── VmRequest ───────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VmRequest {
    pub request_id: Uuid,
    pub operation: VmOperation,
    pub request_status: RequestStatus,
    pub workspace_id: String,
    pub datacenter_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub request_metadata: String,
}

/// Insert payload for [`VmRequest`]. The id and `created_at` are assigned by
/// the database when the row is written.
#[derive(Debug, Clone, Copy)]
pub struct NewVmRequest<'a> {
    pub operation: VmOperation,
    pub request_status: RequestStatus,
    pub workspace_id: &'a str,
    pub datacenter_id: &'a str,
    pub request_metadata: &'a str,
}

impl VmRequest {
    pub async fn insert<'e, E>(executor: E, req: &NewVmRequest<'_>) -> sqlx::Result<Self>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r#"INSERT INTO vm_requests (operation, request_status, workspace_id, datacenter_id, request_metadata)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING *"#,
        )
        .bind(req.operation)
        .bind(req.request_status)
        .bind(req.workspace_id)
        .bind(req.datacenter_id)
        .bind(req.request_metadata)
        .fetch_one(executor)
        .await
    }

    pub async fn get_by_id(pool: &PgPool, request_id: Uuid) -> sqlx::Result<Option<Self>> {
        sqlx::query_as("SELECT * FROM vm_requests WHERE request_id = $1")
            .bind(request_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as("SELECT * FROM vm_requests ORDER BY created_at")
            .fetch_all(pool)
            .await
    }
}

// ── VmDeployInstance ────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VmDeployInstance {
    pub request_id: Uuid,
    pub vm_name: String,
    pub vm_id: String,
    pub vm_status: InstanceStatus,
    pub vm_state_message: String,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewDeployInstance {
    pub vm_name: String,
    pub vm_status: InstanceStatus,
}

/// Three binds per row; Postgres allows 65535 per statement.
const INSERT_BATCH_ROWS: usize = u16::MAX as usize / 3;

impl VmDeployInstance {
    /// Insert all instance rows for a request, batched so no statement
    /// exceeds the Postgres bind parameter limit.
    pub async fn insert_many(
        conn: &mut PgConnection,
        request_id: Uuid,
        instances: &[NewDeployInstance],
    ) -> sqlx::Result<Vec<Self>> {
        let mut rows = Vec::with_capacity(instances.len());
        for batch in instances.chunks(INSERT_BATCH_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO vm_deploy_instances (request_id, vm_name, vm_status) ",
            );
            builder.push_values(batch, |mut row, instance| {
                row.push_bind(request_id)
                    .push_bind(instance.vm_name.as_str())
                    .push_bind(instance.vm_status);
            });
            builder.push(" RETURNING *");
            rows.extend(builder.build_query_as::<Self>().fetch_all(&mut *conn).await?);
        }
        Ok(rows)
    }

    pub async fn list_for_request(pool: &PgPool, request_id: Uuid) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as("SELECT * FROM vm_deploy_instances WHERE request_id = $1 ORDER BY vm_name")
            .bind(request_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as("SELECT * FROM vm_deploy_instances ORDER BY request_id, vm_name")
            .fetch_all(pool)
            .await
    }
}
