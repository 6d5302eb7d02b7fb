//! HTTP surface of the VM request admission service.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{AppConfig, ConfigError, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_app;
pub use state::AppState;
