use consult_service::{
    ServiceConfig, create_app,
    telemetry::{LogFormat, init_tracing},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry LOG_FORMAT and RUST_LOG, so load it before tracing
    let dotenv = dotenvy::dotenv();
    init_tracing(LogFormat::from_env());
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Failed to load .env file: {}", e);
        }
    }
    let config = ServiceConfig::from_env();

    let app = create_app(&config).await?;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Ghana AI Doctor Agent starting on {}", addr);
    info!("Health check endpoint: http://{}/api/health", addr);
    info!("Consultation endpoint: POST http://{}/api/consult", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
