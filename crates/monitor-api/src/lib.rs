//! Typed Rust clients for the monitoring services consulted before a VM
//! request is admitted.
//!
//! Covers the read-only subset needed for pre-flight checks:
//! image-manager (available images), infra-monitor (hosts, clusters) and
//! vm-monitor (per-VM runtime metrics).

mod types;

pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("monitor api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("monitor api {endpoint} returned 404")]
    NotFound { endpoint: &'static str },

    #[error("monitor api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid monitor api path: {0}")]
    InvalidPath(String),
}

impl Error {
    /// True when the underlying HTTP call gave up waiting.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Request(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Connection details shared by all monitor clients.
#[derive(Clone)]
struct Service {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl Service {
    fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    /// Base URL with `segments` appended, each percent-encoded as exactly
    /// one path segment.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(Error::InvalidPath(format!("segment {bad:?} not allowed")));
        }
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidPath(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidPath(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, segments: &[&str]) -> Result<reqwest::RequestBuilder> {
        let req = self.http.get(self.url(segments)?);
        Ok(match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound { endpoint });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        endpoint: &'static str,
    ) -> Result<T> {
        let resp = self.get(segments)?.send().await?;
        Self::check(resp, endpoint)
            .await?
            .json()
            .await
            .map_err(Error::from)
    }
}

// ── Image manager ────────────────────────────────────────────────────

/// Client for the image-manager REST API.
#[derive(Clone)]
pub struct ImageManagerClient {
    service: Service,
}

impl ImageManagerClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            service: Service::new(base_url, token),
        }
    }

    pub async fn list_images(&self) -> Result<Vec<HypervisorImage>> {
        self.service.get_json(&["v1", "images"], "list images").await
    }
}

// ── Infra monitor ────────────────────────────────────────────────────

/// Client for the infra-monitor REST API.
#[derive(Clone)]
pub struct InfraMonitorClient {
    service: Service,
}

impl InfraMonitorClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            service: Service::new(base_url, token),
        }
    }

    pub async fn list_hosts(&self) -> Result<Vec<HypervisorHost>> {
        self.service.get_json(&["v1", "hosts"], "list hosts").await
    }

    pub async fn list_clusters(&self) -> Result<Vec<HypervisorCluster>> {
        self.service.get_json(&["v1", "clusters"], "list clusters").await
    }
}

// ── VM monitor ───────────────────────────────────────────────────────

/// Client for the vm-monitor REST API.
#[derive(Clone)]
pub struct VmMonitorClient {
    service: Service,
}

impl VmMonitorClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            service: Service::new(base_url, token),
        }
    }

    /// Current runtime metrics for one VM. An unknown VM is
    /// [`Error::NotFound`]; an id that is not a single path segment is
    /// [`Error::InvalidPath`].
    pub async fn get_vm_metrics(&self, vm_id: &str) -> Result<VmMetrics> {
        self.service
            .get_json(&["v1", "vms", vm_id, "metrics"], "get vm metrics")
            .await
    }
}
