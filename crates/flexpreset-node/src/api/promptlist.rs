//! Prompt list endpoints.
//!
//! A second namespace over the same store machinery: each title holds one
//! prompt string, stored as a single string field named `prompt`. Prompt
//! documents live in their own directory with their own watcher and push
//! channel.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::preset::StatusResponse;
use crate::state::AppState;

/// Longest prompt accepted without a warning.
const PROMPT_LENGTH_WARN: usize = 4096;

/// Request naming a title inside a prompt document.
#[derive(Debug, Deserialize)]
pub struct PromptListRequest {
    pub yaml_file: String,
    pub title: String,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// The stored prompt for a title.
#[derive(Debug, Serialize)]
pub struct PromptTextResponse {
    pub success: bool,
    pub title: String,
    pub prompt: String,
}

/// Fetch the stored prompt for a title and broadcast the widget state so
/// every attached view converges.
pub async fn get_prompt(
    State(state): State<AppState>,
    Json(req): Json<PromptListRequest>,
) -> Json<PromptTextResponse> {
    state
        .prompts
        .widget_sync(&req.yaml_file, &req.title, req.node_id)
        .await;

    let prompt = state
        .prompts
        .store()
        .panel(&req.yaml_file, &req.title)
        .await
        .get("prompt")
        .map(|f| f.value.clone())
        .unwrap_or_default();

    Json(PromptTextResponse {
        success: true,
        title: req.title,
        prompt,
    })
}

/// Re-enumerate prompt documents and broadcast fresh enums.
pub async fn reload(State(state): State<AppState>) -> Json<StatusResponse> {
    state.prompts.refresh_enums().await;
    Json(StatusResponse { success: true })
}

/// Request to delete a whole title.
#[derive(Debug, Deserialize)]
pub struct DeleteTitleRequest {
    pub yaml_file: String,
    pub title: String,
}

/// Delete a title and everything under it. `success: false` when absent.
pub async fn delete_title(
    State(state): State<AppState>,
    Json(req): Json<DeleteTitleRequest>,
) -> Json<StatusResponse> {
    let success = state
        .prompts
        .delete_title(&req.yaml_file, &req.title)
        .await;
    Json(StatusResponse { success })
}

/// Request to evaluate a prompt.
#[derive(Debug, Deserialize)]
pub struct EvaluatePromptRequest {
    pub yaml_file: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
}

/// Prompt evaluation result: the prompt passes through unchanged.
#[derive(Debug, Serialize)]
pub struct EvaluatePromptResponse {
    pub success: bool,
    pub prompt: String,
}

/// Per-cycle prompt evaluation: persist the prompt under its title when
/// both are non-empty, then pass the prompt through.
pub async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluatePromptRequest>,
) -> Json<EvaluatePromptResponse> {
    if req.prompt.len() > PROMPT_LENGTH_WARN {
        tracing::warn!(
            "Prompt length {} exceeds recommended {}",
            req.prompt.len(),
            PROMPT_LENGTH_WARN
        );
    }

    let success = if req.title.is_empty() || req.prompt.is_empty() {
        true
    } else {
        state
            .prompts
            .save_prompt(&req.yaml_file, &req.title, &req.prompt)
            .await
    };

    Json(EvaluatePromptResponse {
        success,
        prompt: req.prompt,
    })
}
