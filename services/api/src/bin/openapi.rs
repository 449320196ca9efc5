//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3 document of the Dream Weaver REST API to disk.
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`).

use api_lib::{error::ApiError, web::ApiDoc};
use utoipa::OpenApi;

fn main() -> Result<(), ApiError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let doc = ApiDoc::openapi();
    let spec_json = doc
        .to_pretty_json()
        .map_err(|e| ApiError::Internal(format!("Failed to serialize OpenAPI document: {}", e)))?;
    std::fs::write(&path, spec_json)?;

    println!(
        "OpenAPI document with {} paths written to {}",
        doc.paths.paths.len(),
        path
    );
    Ok(())
}
