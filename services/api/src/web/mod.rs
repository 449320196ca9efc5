pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use state::AppState;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{
    analyze_dream_handler, chat_handler, create_consultation_handler,
    delete_consultation_handler, get_consultation_handler, knowledge_base_handler,
    reset_consultation_handler, ApiDoc,
};

/// Builds the complete application: API routes, CORS and the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let api_router = Router::new()
        .route("/consultations", post(create_consultation_handler))
        .route(
            "/consultations/{id}",
            get(get_consultation_handler).delete(delete_consultation_handler),
        )
        .route("/consultations/{id}/analysis", post(analyze_dream_handler))
        .route("/consultations/{id}/chat", post(chat_handler))
        .route("/consultations/{id}/reset", post(reset_consultation_handler))
        .route("/knowledge-base", get(knowledge_base_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
