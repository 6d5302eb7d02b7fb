use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use vmr_core::{AdmitterConfig, MonitorEndpoints, PipelineConfig, ValidationConfig, VmValidationPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where requests are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub listen_addr: SocketAddr,
    pub monitors: MonitorEndpoints,
    pub pipeline: PipelineConfig,
    /// Prefix of the `Location` header returned for admitted requests.
    pub request_base_path: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let store_backend = vars.parse("STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let validation = ValidationConfig {
            enabled: vars.parse("VALIDATE_CLIENT_REQUEST", false)?,
            vm_policy: vars.parse("VM_VALIDATION_POLICY", VmValidationPolicy::Strict)?,
            strict_vm_timeout: vars.millis("STRICT_VM_TIMEOUT_MS", 60_000)?,
            best_effort_vm_timeout: vars.millis("BEST_EFFORT_VM_TIMEOUT_MS", 10)?,
            lookup_timeout: vars.millis("LOOKUP_TIMEOUT_MS", 30_000)?,
        };
        let admission = AdmitterConfig {
            store_timeout: vars.millis("STORE_TIMEOUT_MS", 10_000)?,
            atomic: vars.parse("ATOMIC_ADMISSION", false)?,
            max_vms_per_deploy: vars.parse("MAX_VMS_PER_DEPLOY", 1000)?,
        };

        Ok(Self {
            database_url,
            store_backend,
            listen_addr: vars.parse("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            monitors: MonitorEndpoints {
                image_manager_url: vars.string("IMAGE_MANAGER_URL", "http://image-manager:8081"),
                infra_monitor_url: vars.string("INFRA_MONITOR_URL", "http://infra-monitor:8082"),
                vm_monitor_url: vars.string("VM_MONITOR_URL", "http://vm-monitor:8083"),
                token: lookup("MONITOR_API_TOKEN").filter(|t| !t.is_empty()),
            },
            pipeline: PipelineConfig {
                validation,
                admission,
            },
            request_base_path: vars.string(
                "REQUEST_BASE_PATH",
                "/virtualization/v1beta1/virtual-machines-request/",
            ),
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, name: &str, default: &str) -> String {
        (self.0)(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(name) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn millis(&self, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.parse(name, default).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/vmr")]).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Postgres);
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:8080");
        assert!(!cfg.pipeline.validation.enabled);
        assert_eq!(cfg.pipeline.validation.vm_policy, VmValidationPolicy::Strict);
        assert_eq!(cfg.pipeline.validation.strict_vm_timeout, Duration::from_secs(60));
        assert_eq!(cfg.pipeline.validation.best_effort_vm_timeout, Duration::from_millis(10));
        assert_eq!(cfg.pipeline.admission.store_timeout, Duration::from_secs(10));
        assert!(!cfg.pipeline.admission.atomic);
        assert_eq!(cfg.pipeline.admission.max_vms_per_deploy, 1000);
        assert_eq!(cfg.monitors.token, None);
        assert_eq!(
            cfg.request_base_path,
            "/virtualization/v1beta1/virtual-machines-request/"
        );
    }

    #[test]
    fn database_url_required_for_postgres_only() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("DATABASE_URL"))));
        let cfg = config(&[("STORE_BACKEND", "memory")]).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("STORE_BACKEND", "memory"),
            ("VALIDATE_CLIENT_REQUEST", "true"),
            ("VM_VALIDATION_POLICY", "best_effort"),
            ("LOOKUP_TIMEOUT_MS", "1500"),
            ("ATOMIC_ADMISSION", "true"),
            ("MAX_VMS_PER_DEPLOY", "25"),
            ("MONITOR_API_TOKEN", "svc"),
        ])
        .unwrap();
        assert_eq!(cfg.pipeline.admission.max_vms_per_deploy, 25);
        assert!(cfg.pipeline.validation.enabled);
        assert_eq!(cfg.pipeline.validation.vm_policy, VmValidationPolicy::BestEffort);
        assert_eq!(cfg.pipeline.validation.lookup_timeout, Duration::from_millis(1500));
        assert!(cfg.pipeline.admission.atomic);
        assert_eq!(cfg.monitors.token.as_deref(), Some("svc"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("STORE_BACKEND", "memory"), ("STORE_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORE_TIMEOUT_MS", .. }));

        let err = config(&[("STORE_BACKEND", "memory"), ("VM_VALIDATION_POLICY", "yolo")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "VM_VALIDATION_POLICY", .. }));

        let err = config(&[("STORE_BACKEND", "memory"), ("MAX_VMS_PER_DEPLOY", "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAX_VMS_PER_DEPLOY", .. }));
    }
}
