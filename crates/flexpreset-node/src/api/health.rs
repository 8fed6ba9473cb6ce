//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response: store shape at a glance.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Preset documents currently on disk.
    pub preset_documents: usize,
    /// Prompt list documents currently on disk.
    pub prompt_documents: usize,
    /// Connected push observers across both namespaces.
    pub observers: usize,
}

/// Health check endpoint. Read-only: counts documents without seeding.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        preset_documents: state.service.store().document_count().await,
        prompt_documents: state.prompts.store().document_count().await,
        observers: state.service.observer_count() + state.prompts.observer_count(),
    })
}
