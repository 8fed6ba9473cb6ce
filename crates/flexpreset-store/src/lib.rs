//! # FlexPreset Store
//!
//! Live, file-backed preset store: one YAML document per file, a change
//! watcher over the backing directory, and a dynamic output schema derived
//! from the selected preset.
//!
//! The entry point is [`PresetService`], an explicitly owned service object
//! with a single-instance-per-directory contract. It bundles the document
//! store, the in-memory panel order tracker, the push-event broadcaster and
//! the directory watcher.

pub mod eval;
pub mod events;
pub mod order;
pub mod schema;
pub mod service;
pub mod store;
pub mod watcher;

pub use eval::Evaluation;
pub use events::{
    EnumRefreshPayload, EventBroadcaster, EventSubscription, PushEvent, PushTransport,
    WidgetSyncPayload,
};
pub use order::PanelOrderTracker;
pub use service::PresetService;
pub use store::{PresetStore, StoreConfig, DOCUMENT_EXTENSION};
pub use watcher::{DocumentWatcher, WatchCallback};
