//! Application state.

use std::sync::Arc;

use flexpreset_store::PresetService;

/// Shared application state: one service per document namespace.
#[derive(Clone)]
pub struct AppState {
    /// Preset documents (typed field panels).
    pub service: Arc<PresetService>,

    /// Prompt list documents (one prompt string per title).
    pub prompts: Arc<PresetService>,
}

impl AppState {
    /// Wrap the namespace services for sharing across handlers.
    pub fn new(service: Arc<PresetService>, prompts: Arc<PresetService>) -> Self {
        Self { service, prompts }
    }
}
