//! # FlexPreset Node
//!
//! FlexPreset node binary: HTTP mutation API plus WebSocket push over a
//! directory-backed preset store.

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use flexpreset_store::{PresetService, StoreConfig};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod api;
mod state;

use state::AppState;

/// Run the FlexPreset node server.
pub async fn run_server(
    addr: SocketAddr,
    presets: StoreConfig,
    prompts: StoreConfig,
) -> anyhow::Result<()> {
    let service = PresetService::open(presets)?;
    service.start_watching().await?;

    let prompt_service = PresetService::open(prompts)?;
    prompt_service.start_watching().await?;

    let app = create_router(AppState::new(service.clone(), prompt_service.clone()));

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    service.shutdown().await;
    prompt_service.shutdown().await;
    Ok(())
}

/// Create the API router.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Preset API
        .route("/flexpreset/get_prompt", post(api::preset::get_prompt))
        .route("/flexpreset/value/add", post(api::preset::add_value))
        .route("/flexpreset/value/update", post(api::preset::update_value))
        .route("/flexpreset/value/delete", post(api::preset::delete_value))
        .route("/flexpreset/value/update_key", post(api::preset::update_key))
        .route("/flexpreset/reload", post(api::preset::reload))
        .route("/flexpreset/panel_order", post(api::preset::panel_order))
        .route("/flexpreset/evaluate", post(api::preset::evaluate))
        // WebSocket push
        .route("/flexpreset/events", get(api::ws::events_stream))
        // Prompt list API
        .route("/promptlist/get_prompt", post(api::promptlist::get_prompt))
        .route("/promptlist/delete_title", post(api::promptlist::delete_title))
        .route("/promptlist/reload", post(api::promptlist::reload))
        .route("/promptlist/evaluate", post(api::promptlist::evaluate))
        .route("/promptlist/events", get(api::ws::prompt_events_stream))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Preset store configuration from the environment: `FLEXPRESET_DIR`
/// (default `./presets`) with a one-shot migration from a legacy `./yaml`
/// sibling.
fn preset_config_from_env() -> StoreConfig {
    let dir = std::env::var("FLEXPRESET_DIR").unwrap_or_else(|_| "./presets".to_string());
    StoreConfig::new(dir).with_legacy_dir("./yaml")
}

/// Prompt list store configuration: `FLEXPRESET_PROMPT_DIR` (default
/// `./prompts`), seeded with a prompt placeholder instead of a field one.
fn prompt_config_from_env() -> StoreConfig {
    let dir = std::env::var("FLEXPRESET_PROMPT_DIR").unwrap_or_else(|_| "./prompts".to_string());
    StoreConfig::new(dir).with_seed("prompt", "Enter your prompt here")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let port = std::env::var("FLEXPRESET_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    run_server(addr, preset_config_from_env(), prompt_config_from_env()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service = PresetService::open(StoreConfig::new(dir.path().join("presets"))).unwrap();
        let prompts = PresetService::open(
            StoreConfig::new(dir.path().join("prompts"))
                .with_seed("prompt", "Enter your prompt here"),
        )
        .unwrap();
        (AppState::new(service, prompts), dir)
    }

    fn test_app() -> (Router, TempDir) {
        let (state, dir) = test_state();
        (create_router(state), dir)
    }

    async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        // Counting is read-only; a health probe must not seed documents.
        assert_eq!(body["preset_documents"], 0);
        assert_eq!(body["prompt_documents"], 0);
        assert_eq!(body["observers"], 0);
    }

    #[tokio::test]
    async fn test_add_then_get_prompt() {
        let (app, _dir) = test_app();

        let (status, body) = post_json(
            &app,
            "/flexpreset/value/add",
            json!({
                "yaml_file": "scene.yaml",
                "title": "portrait",
                "key": "steps",
                "value_type": "int",
                "value": "20"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = post_json(
            &app,
            "/flexpreset/get_prompt",
            json!({ "yaml_file": "scene.yaml", "title": "portrait" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["keys_order"], json!(["steps"]));
        assert_eq!(body["output_names"], json!(["steps_int"]));
        assert_eq!(body["outputs"], json!(["INT"]));
        assert_eq!(body["values"]["steps"]["value"], "20");
    }

    #[tokio::test]
    async fn test_evaluate_seeded_default() {
        let (app, _dir) = test_app();

        // Enumerating an empty directory seeds the default document.
        let (status, body) = post_json(&app, "/flexpreset/reload", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = post_json(
            &app,
            "/flexpreset/evaluate",
            json!({ "yaml_file": "default.yaml", "title": "example" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output_names"], json!(["sample_key_string"]));
        assert_eq!(body["output_types"], json!(["STRING"]));
        assert_eq!(body["outputs"], json!(["Enter your value here"]));
    }

    #[tokio::test]
    async fn test_evaluate_conversion_failure_is_422() {
        let (app, _dir) = test_app();

        post_json(
            &app,
            "/flexpreset/value/add",
            json!({
                "yaml_file": "scene.yaml",
                "title": "p",
                "key": "steps",
                "value_type": "int",
                "value": "lots"
            }),
        )
        .await;

        let request = Request::builder()
            .method("POST")
            .uri("/flexpreset/evaluate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "yaml_file": "scene.yaml", "title": "p" }).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let message = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(message.contains("steps"));
    }

    #[tokio::test]
    async fn test_panel_order_drives_evaluation() {
        let (app, _dir) = test_app();

        for (key, value_type, value) in [("a", "int", "1"), ("b", "float", "0.5")] {
            post_json(
                &app,
                "/flexpreset/value/add",
                json!({
                    "yaml_file": "scene.yaml",
                    "title": "p",
                    "key": key,
                    "value_type": value_type,
                    "value": value
                }),
            )
            .await;
        }

        let (status, body) =
            post_json(&app, "/flexpreset/panel_order", json!({ "order": ["b", "a"] })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = post_json(
            &app,
            "/flexpreset/evaluate",
            json!({ "yaml_file": "scene.yaml", "title": "p" }),
        )
        .await;
        assert_eq!(body["output_names"], json!(["b_float", "a_int"]));
        assert_eq!(body["outputs"], json!([0.5, 1]));
    }

    #[tokio::test]
    async fn test_noop_mutations_report_failure() {
        let (app, _dir) = test_app();

        let (status, body) = post_json(
            &app,
            "/flexpreset/value/delete",
            json!({ "yaml_file": "scene.yaml", "title": "p", "key": "missing" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);

        let (status, body) = post_json(
            &app,
            "/flexpreset/value/update_key",
            json!({
                "yaml_file": "scene.yaml",
                "title": "p",
                "old_key": "missing",
                "new_key": "other"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_rename_via_api() {
        let (app, _dir) = test_app();

        post_json(
            &app,
            "/flexpreset/value/add",
            json!({
                "yaml_file": "scene.yaml",
                "title": "p",
                "key": "width",
                "value_type": "int",
                "value": "100"
            }),
        )
        .await;

        let (_, body) = post_json(
            &app,
            "/flexpreset/value/update_key",
            json!({
                "yaml_file": "scene.yaml",
                "title": "p",
                "old_key": "width",
                "new_key": "width_px"
            }),
        )
        .await;
        assert_eq!(body["success"], true);

        let (_, body) = post_json(
            &app,
            "/flexpreset/get_prompt",
            json!({ "yaml_file": "scene.yaml", "title": "p" }),
        )
        .await;
        assert_eq!(body["keys_order"], json!(["width_px"]));
    }

    #[tokio::test]
    async fn test_rename_with_client_panel_order() {
        let (state, _dir) = test_state();
        let app = create_router(state.clone());

        for key in ["width", "height"] {
            post_json(
                &app,
                "/flexpreset/value/add",
                json!({
                    "yaml_file": "scene.yaml",
                    "title": "p",
                    "key": key,
                    "value_type": "int",
                    "value": "1"
                }),
            )
            .await;
        }

        let (_, body) = post_json(
            &app,
            "/flexpreset/value/update_key",
            json!({
                "yaml_file": "scene.yaml",
                "title": "p",
                "old_key": "height",
                "new_key": "height_px",
                "panel_order": ["height_px", "width"]
            }),
        )
        .await;
        assert_eq!(body["success"], true);

        // The client's order is authoritative for schema resolution.
        let (_, body) = post_json(
            &app,
            "/flexpreset/evaluate",
            json!({ "yaml_file": "scene.yaml", "title": "p" }),
        )
        .await;
        assert_eq!(body["output_names"], json!(["height_px_int", "width_int"]));
    }

    #[tokio::test]
    async fn test_get_prompt_init_outputs_refreshes_enums() {
        let (state, _dir) = test_state();
        let app = create_router(state.clone());
        let mut subscription = state.service.subscribe();

        post_json(
            &app,
            "/flexpreset/get_prompt",
            json!({
                "yaml_file": "scene.yaml",
                "title": "p",
                "init_outputs": true
            }),
        )
        .await;

        // Enum refresh lands before the widget sync on workflow load.
        let event = subscription.receiver.recv().await.unwrap();
        assert_eq!(event.event_name(), "flexpreset_enum");
        let event = subscription.receiver.recv().await.unwrap();
        assert_eq!(event.event_name(), "flexpreset_widgets");
    }

    #[tokio::test]
    async fn test_prompt_save_on_evaluate_round_trip() {
        let (app, _dir) = test_app();

        let (status, body) = post_json(
            &app,
            "/promptlist/evaluate",
            json!({
                "yaml_file": "lists.yaml",
                "title": "greeting",
                "prompt": "hello there"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["prompt"], "hello there");

        let (_, body) = post_json(
            &app,
            "/promptlist/get_prompt",
            json!({ "yaml_file": "lists.yaml", "title": "greeting" }),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["prompt"], "hello there");
    }

    #[tokio::test]
    async fn test_prompt_evaluate_without_title_does_not_save() {
        let (state, _dir) = test_state();
        let app = create_router(state.clone());

        let (_, body) = post_json(
            &app,
            "/promptlist/evaluate",
            json!({ "yaml_file": "lists.yaml", "prompt": "unsaved" }),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["prompt"], "unsaved");
        assert!(!state.prompts.store().exists("lists.yaml").await);
    }

    #[tokio::test]
    async fn test_prompt_delete_title() {
        let (app, _dir) = test_app();

        for title in ["keep", "gone"] {
            post_json(
                &app,
                "/promptlist/evaluate",
                json!({ "yaml_file": "lists.yaml", "title": title, "prompt": "text" }),
            )
            .await;
        }

        let (status, body) = post_json(
            &app,
            "/promptlist/delete_title",
            json!({ "yaml_file": "lists.yaml", "title": "gone" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = post_json(
            &app,
            "/promptlist/delete_title",
            json!({ "yaml_file": "lists.yaml", "title": "gone" }),
        )
        .await;
        assert_eq!(body["success"], false);

        let (_, body) = post_json(
            &app,
            "/promptlist/get_prompt",
            json!({ "yaml_file": "lists.yaml", "title": "keep" }),
        )
        .await;
        assert_eq!(body["prompt"], "text");
    }

    #[tokio::test]
    async fn test_prompt_namespaces_are_isolated() {
        let (state, _dir) = test_state();
        let app = create_router(state.clone());

        post_json(
            &app,
            "/promptlist/evaluate",
            json!({ "yaml_file": "lists.yaml", "title": "t", "prompt": "text" }),
        )
        .await;

        // The preset namespace has its own directory and never sees
        // prompt documents.
        assert!(!state.service.store().exists("lists.yaml").await);
        assert!(state.prompts.store().exists("lists.yaml").await);
    }
}
