//! Preset mutation and evaluation endpoints.
//!
//! All mutation endpoints are POST with a JSON body and reply with at
//! least `{"success": bool}`. Handlers stay thin: every decision lives in
//! the service layer.

use axum::{extract::State, http::StatusCode, Json};
use flexpreset_core::{OutputType, OutputValue, Panel, ValueType};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

fn default_true() -> bool {
    true
}

/// Minimal mutation outcome.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
}

/// Request naming a preset inside a document.
#[derive(Debug, Deserialize)]
pub struct PresetRequest {
    pub yaml_file: String,
    pub title: String,
    #[serde(default)]
    pub node_id: Option<String>,
    /// Set on workflow load so the client also gets fresh enums.
    #[serde(default)]
    pub init_outputs: bool,
}

/// Current widget state of a preset.
#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub success: bool,
    pub title: String,
    pub values: Panel,
    pub keys_order: Vec<String>,
    pub outputs: Vec<OutputType>,
    pub output_names: Vec<String>,
}

/// Fetch a preset's values and broadcast them so every attached view
/// converges on the same widget state.
pub async fn get_prompt(
    State(state): State<AppState>,
    Json(req): Json<PresetRequest>,
) -> Json<PromptResponse> {
    if req.init_outputs {
        state.service.refresh_enums().await;
    }

    let payload = state
        .service
        .widget_sync(&req.yaml_file, &req.title, req.node_id)
        .await;

    Json(PromptResponse {
        success: true,
        title: payload.title,
        values: payload.values,
        keys_order: payload.keys_order,
        outputs: payload.outputs,
        output_names: payload.output_names,
    })
}

/// Request to add or overwrite a field.
#[derive(Debug, Deserialize)]
pub struct ValueWriteRequest {
    pub yaml_file: String,
    pub title: String,
    pub key: String,
    pub value_type: ValueType,
    pub value: String,
    #[serde(default)]
    pub node_id: Option<String>,
    /// False while the user is still typing; the write happens but no
    /// output refresh is broadcast.
    #[serde(default = "default_true")]
    pub update_outputs: bool,
}

/// Add a new field to a preset.
pub async fn add_value(
    State(state): State<AppState>,
    Json(req): Json<ValueWriteRequest>,
) -> Json<StatusResponse> {
    let success = state
        .service
        .add_or_update_value(
            &req.yaml_file,
            &req.title,
            &req.key,
            req.value_type,
            &req.value,
            req.node_id,
            req.update_outputs,
        )
        .await;
    Json(StatusResponse { success })
}

/// Overwrite an existing field. Same write path as add; the field keeps
/// its panel position.
pub async fn update_value(
    State(state): State<AppState>,
    Json(req): Json<ValueWriteRequest>,
) -> Json<StatusResponse> {
    add_value(State(state), Json(req)).await
}

/// Request to delete a field.
#[derive(Debug, Deserialize)]
pub struct ValueDeleteRequest {
    pub yaml_file: String,
    pub title: String,
    pub key: String,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Delete a field. `success: false` when it was absent.
pub async fn delete_value(
    State(state): State<AppState>,
    Json(req): Json<ValueDeleteRequest>,
) -> Json<StatusResponse> {
    let success = state
        .service
        .delete_value(&req.yaml_file, &req.title, &req.key, req.node_id)
        .await;
    Json(StatusResponse { success })
}

/// Request to rename a field.
#[derive(Debug, Deserialize)]
pub struct KeyRenameRequest {
    pub yaml_file: String,
    pub title: String,
    pub old_key: String,
    pub new_key: String,
    /// Authoritative post-rename field order from the client; replaces
    /// the tracker wholesale when present.
    #[serde(default)]
    pub panel_order: Option<Vec<String>>,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Rename a field in place. `success: false` on any no-op.
pub async fn update_key(
    State(state): State<AppState>,
    Json(req): Json<KeyRenameRequest>,
) -> Json<StatusResponse> {
    let success = state
        .service
        .rename_key(
            &req.yaml_file,
            &req.title,
            &req.old_key,
            &req.new_key,
            req.panel_order,
            req.node_id,
        )
        .await;
    Json(StatusResponse { success })
}

/// Re-enumerate documents and broadcast fresh enums to every observer.
pub async fn reload(State(state): State<AppState>) -> Json<StatusResponse> {
    state.service.refresh_enums().await;
    Json(StatusResponse { success: true })
}

/// Request replacing the panel field order.
#[derive(Debug, Deserialize)]
pub struct PanelOrderRequest {
    pub order: Vec<String>,
}

/// Record the user-arranged field order for subsequent schema resolution.
pub async fn panel_order(
    State(state): State<AppState>,
    Json(req): Json<PanelOrderRequest>,
) -> Json<StatusResponse> {
    state.service.set_panel_order(req.order).await;
    Json(StatusResponse { success: true })
}

/// Request to evaluate a preset.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub yaml_file: String,
    /// The pre-enumerated preset selection.
    #[serde(default)]
    pub title: String,
    /// Overrides `title` when non-empty; created on first use.
    #[serde(default)]
    pub preset_name: String,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Evaluation result: parallel name/type/value vectors.
#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub success: bool,
    pub output_names: Vec<String>,
    pub output_types: Vec<OutputType>,
    pub outputs: Vec<OutputValue>,
}

/// Evaluate a preset into typed output values.
pub async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, (StatusCode, String)> {
    let node_id = req.node_id.as_deref().unwrap_or("");
    let evaluation = state
        .service
        .evaluate(&req.yaml_file, &req.title, &req.preset_name, node_id)
        .await
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    Ok(Json(EvaluateResponse {
        success: true,
        output_names: evaluation.schema.iter().map(|e| e.name.clone()).collect(),
        output_types: evaluation.schema.iter().map(|e| e.output_type).collect(),
        outputs: evaluation.values,
    }))
}
