use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Image manager ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypervisorImage {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub name: Option<String>,
}

// ── Infra monitor ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypervisorHost {
    pub host_name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypervisorCluster {
    pub cluster_name: String,
    pub status: String,
}

// ── VM monitor ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmMetrics {
    #[serde(default)]
    pub vm_id: Option<String>,
    #[serde(alias = "powerstate")]
    pub power_state: String,
    /// Remaining metrics (cpu, memory, uptime, ...) passed through untouched.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
