use anyhow::{Context, Result};
use linkgate::config::GatewayConfig;
use linkgate::credentials::{run_token_sweep, CredentialStore, TokenStore};
use service_registry::api::{create_router, AppState};
use service_registry::services::linkedin::LinkedInService;
use service_registry::state::{run_state_cleanup, StateManager};
use service_registry::ServiceRegistry;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "service_registry=info,linkgate=info".into()),
        )
        .init();

    info!("LinkedIn gateway starting...");

    let config = GatewayConfig::from_env_or_file()?;

    let encryption_key = std::env::var("LINKGATE_ENCRYPTION_KEY")
        .context("LINKGATE_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    // The schema is created here, once, before any request is accepted.
    let store: Arc<dyn TokenStore> = Arc::new(
        CredentialStore::new(&config.storage.database_path, &encryption_key)
            .context("Failed to initialize credential store")?,
    );
    info!(database = %config.storage.database_path, "Credential store initialized");

    if config.linkedin.client_id.is_none() || config.linkedin.client_secret.is_none() {
        warn!("LINKEDIN_CLIENT_ID / LINKEDIN_CLIENT_SECRET not set; authorization methods will fail");
    }

    let mut registry = ServiceRegistry::new();
    registry.register(Arc::new(
        LinkedInService::new(config.linkedin.clone(), Arc::clone(&store))
            .context("Failed to initialize LinkedIn service")?,
    ));
    info!(services = ?registry.list_names(), "Services registered");

    if config.storage.sweep_interval_seconds > 0 {
        tokio::spawn(run_token_sweep(
            Arc::clone(&store),
            config.storage.sweep_interval_seconds,
        ));
    }

    let state_manager = StateManager::new(config.oauth.state_expiry_seconds);
    tokio::spawn(run_state_cleanup(
        state_manager.clone(),
        config.oauth.state_cleanup_interval_seconds.max(1),
    ));

    let router = create_router(AppState {
        registry: Arc::new(registry),
        state_manager,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "HTTP API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("LinkedIn gateway stopped");

    Ok(())
}
