//! services/api/src/bin/api.rs

use api_lib::{
    adapters::OpenAiDreamAdapter,
    config::Config,
    error::ApiError,
    web::{
        build_router,
        state::{AppState, SWEEP_INTERVAL},
    },
};
use dream_weaver_core::DreamInterpreter;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Model Adapter ---
    if config.api_key.is_none() {
        warn!("No GEMINI_API_KEY or OPENAI_API_KEY set; every analysis will fail until one is configured.");
    }
    let model_adapter = Arc::new(OpenAiDreamAdapter::from_settings(
        config.api_key.as_deref(),
        &config.llm_api_base,
        config.dream_model.clone(),
    ));
    info!(
        "Using model {} at {} (timeout {:?}).",
        config.dream_model, config.llm_api_base, config.request_timeout
    );

    // --- 3. Build the Shared AppState ---
    let interpreter = Arc::new(DreamInterpreter::new(model_adapter, config.request_timeout));
    let app_state = Arc::new(AppState::new(config.clone(), interpreter));
    app_state.consultations.spawn_sweeper(SWEEP_INTERVAL);
    info!(
        "Consultations expire after {:?} idle (at most {} open).",
        config.consultation_idle_timeout, config.max_consultations
    );

    // --- 4. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
