//! Admission pipeline for VM lifecycle requests.
//!
//! A request is checked against the monitoring services, persisted as a
//! `NEW` request row (plus instance rows for deploys) and later read back
//! by id or in bulk. Failures are mapped onto each operation's typed error
//! responses by [`taxonomy`].

pub mod admission;
pub mod clients;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod preflight;
pub mod query;
pub mod taxonomy;

pub use admission::{Admission, AdmittedRequest, AdmitterConfig, RequestAdmitter, RequestScope};
pub use clients::{MonitorEndpoints, ValidationClients};
pub use error::{ApiResponseError, ErrorCode, PipelineError, Result};
pub use pipeline::{AdmissionPipeline, PipelineConfig};
pub use preflight::{PreflightValidator, ValidationConfig, VmValidationPolicy};
pub use query::{RequestListing, RequestQueryService, RequestWithInstances};
