use std::sync::Arc;
use vehicle_predictive_maintenance::{
    api::{build_router, AppState},
    config::Config,
    logging::init_tracing,
    ml::{ArtifactStore, ServingModel},
    AppError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    init_tracing(&config.observability);

    tracing::info!(
        "Starting {} v{}",
        config.observability.service_name,
        env!("CARGO_PKG_VERSION")
    );

    // Load model artifacts
    let store = ArtifactStore::new(&config.model.artifact_dir);
    let mut state = AppState::new(config.observability.service_name.clone());
    match ServingModel::load(&store) {
        Ok(model) => {
            tracing::info!(
                "✅ Model loaded: {} ({} classes)",
                model.metadata().hyperparameters,
                model.metadata().classes.len()
            );
            state = state.with_model(Arc::new(model));
        }
        Err(e) if config.model.require_artifacts_at_startup => {
            tracing::error!("Failed to load model artifacts: {}", e);
            return Err(e.into());
        }
        Err(e @ AppError::ArtifactMissing(_)) => {
            tracing::warn!("⚠️  {}", e);
            tracing::warn!("   Starting unready; /health reports 503 until restarted with artifacts");
        }
        Err(e) => {
            tracing::error!("Failed to load model artifacts: {}", e);
            return Err(e.into());
        }
    }

    let app = build_router(state);

    // Start HTTP server
    let http_addr = config.bind_address();
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Predict: POST http://{}/predict", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
