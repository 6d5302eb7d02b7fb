use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use vmr_api::{AppConfig, AppState, ConfigError, StoreBackend, create_app};
use vmr_core::{AdmissionPipeline, ValidationClients};
use vmr_db::memory::MemoryRequestStore;
use vmr_db::{PgRequestStore, RequestStore};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "vmr-api stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;

    let store: Arc<dyn RequestStore> = match (config.store_backend, &config.database_url) {
        (StoreBackend::Postgres, Some(url)) => {
            let pool = vmr_db::create_pool(url).await?;
            vmr_db::run_migrations(&pool).await?;
            tracing::info!("connected to postgres request store");
            Arc::new(PgRequestStore::new(pool))
        }
        (StoreBackend::Postgres, None) => return Err(ConfigError::Missing("DATABASE_URL").into()),
        (StoreBackend::Memory, _) => {
            tracing::warn!("using in-memory request store, requests are lost on restart");
            Arc::new(MemoryRequestStore::new())
        }
    };

    let clients = ValidationClients::from_endpoints(&config.monitors);
    tracing::info!(
        validation = config.pipeline.validation.enabled,
        policy = ?config.pipeline.validation.vm_policy,
        atomic = config.pipeline.admission.atomic,
        "admission pipeline ready"
    );
    let pipeline = AdmissionPipeline::new(clients, store, config.pipeline.clone());

    let listen_addr = config.listen_addr;
    let app = create_app(AppState::new(pipeline, config));

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "starting vm request API");

    axum::serve(listener, app).await?;
    Ok(())
}
