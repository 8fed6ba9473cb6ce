//! The preset service: mutation API, schema resolution and evaluation.
//!
//! One service instance per directory. Both change triggers — the external
//! one (directory watcher) and the internal one (mutation API) — funnel
//! into [`PresetService::refresh_enums`], which is idempotent and safe to
//! run redundantly.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use flexpreset_core::{Field, OutputValue, Result, SchemaEntry, ValueType};
use tokio::sync::Mutex;

use crate::eval::{convert_value, reconcile_arity, Evaluation};
use crate::events::{
    EnumRefreshPayload, EventBroadcaster, EventSubscription, PushEvent, PushTransport,
    WidgetSyncPayload,
};
use crate::order::PanelOrderTracker;
use crate::schema::{processing_order, schema_for_panel};
use crate::store::{PresetStore, StoreConfig};
use crate::watcher::{DocumentWatcher, WatchCallback};

/// Live preset store service. Construct one per directory and share it via
/// [`Arc`]; there is deliberately no ambient global instance.
pub struct PresetService {
    store: PresetStore,
    tracker: PanelOrderTracker,
    broadcaster: EventBroadcaster,
    watcher: Mutex<DocumentWatcher>,
}

impl PresetService {
    /// Open the backing directory and build a service around it. The
    /// watcher is not started; call [`start_watching`](Self::start_watching).
    pub fn open(config: StoreConfig) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            store: PresetStore::open(config)?,
            tracker: PanelOrderTracker::new(),
            broadcaster: EventBroadcaster::new(),
            watcher: Mutex::new(DocumentWatcher::new()),
        }))
    }

    /// The underlying document store.
    pub fn store(&self) -> &PresetStore {
        &self.store
    }

    /// Subscribe to push events.
    pub fn subscribe(&self) -> EventSubscription {
        self.broadcaster.subscribe()
    }

    /// Number of currently connected push observers.
    pub fn observer_count(&self) -> usize {
        self.broadcaster.observer_count()
    }

    /// Start watching the backing directory for external edits.
    pub async fn start_watching(self: &Arc<Self>) -> Result<()> {
        let callback = RefreshOnChange {
            service: Arc::downgrade(self),
        };
        let mut watcher = self.watcher.lock().await;
        watcher.start(self.store.dir(), callback)
    }

    /// Stop the watcher. Idempotent; also safe from an exit hook.
    pub async fn shutdown(&self) {
        self.watcher.lock().await.stop();
    }

    /// Re-enumerate everything and broadcast the result.
    ///
    /// This is the convergence point for watcher events, mutations and
    /// explicit reload requests. Redundant invocations cost CPU, not
    /// correctness.
    pub async fn refresh_enums(&self) {
        let yaml_files = match self.store.list_documents().await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!("Failed to enumerate documents: {}", e);
                return;
            }
        };

        let mut titles_by_yaml = HashMap::new();
        let mut values_by_yaml_title = HashMap::new();
        for file in &yaml_files {
            let document = self.store.read(file).await;
            let titles = document.titles();
            for title in &titles {
                let keys: Vec<String> = document
                    .preset(title)
                    .map(|p| p.values.keys().cloned().collect())
                    .unwrap_or_default();
                values_by_yaml_title.insert(format!("{}::{}", file, title), keys);
            }
            titles_by_yaml.insert(file.clone(), titles);
        }

        self.broadcaster
            .publish(PushEvent::EnumRefresh(EnumRefreshPayload {
                yaml_files,
                titles_by_yaml,
                values_by_yaml_title,
            }))
            .await;
    }

    /// Resolve the ordered output schema for a preset.
    ///
    /// An empty preset name or an unknown document resolves to the single
    /// default `{STRING, "output"}` entry.
    pub async fn resolve_schema(&self, doc: &str, preset: &str) -> Vec<SchemaEntry> {
        if preset.is_empty() || !self.store.exists(doc).await {
            return vec![SchemaEntry::default_output()];
        }

        let panel = self.store.panel(doc, preset).await;
        let tracker_order = self.tracker.get().await;
        schema_for_panel(&tracker_order, &panel)
    }

    /// Add a field or overwrite an existing one (keeping its position).
    ///
    /// A value that does not lexically match its declared type is logged
    /// and written anyway; the store trusts the caller more than it
    /// polices input. Returns false only on I/O failure.
    pub async fn add_or_update_value(
        &self,
        doc: &str,
        preset: &str,
        field: &str,
        declared: ValueType,
        value: &str,
        node_id: Option<String>,
        update_outputs: bool,
    ) -> bool {
        if !declared.matches(value) {
            tracing::warn!(
                "Value '{}' does not match declared type '{}' for key '{}'",
                value,
                declared,
                field
            );
        }

        let result = self
            .store
            .update(doc, |document| {
                document
                    .ensure_preset(preset)
                    .values
                    .insert(field.to_string(), Field::new(declared, value));
                true
            })
            .await;

        match result {
            Ok(_) => {
                if update_outputs {
                    self.after_mutation(doc, preset, node_id).await;
                }
                true
            }
            Err(e) => {
                tracing::error!("Failed to write value '{}' to {}: {}", field, doc, e);
                false
            }
        }
    }

    /// Delete a field. Reports false when the field was absent.
    pub async fn delete_value(
        &self,
        doc: &str,
        preset: &str,
        field: &str,
        node_id: Option<String>,
    ) -> bool {
        self.tracker.remove(field).await;

        let result = self
            .store
            .update(doc, |document| {
                document
                    .presets
                    .get_mut(preset)
                    .map(|p| p.values.shift_remove(field).is_some())
                    .unwrap_or(false)
            })
            .await;

        match result {
            Ok(true) => {
                self.after_mutation(doc, preset, node_id).await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!("Failed to delete '{}' from {}: {}", field, doc, e);
                false
            }
        }
    }

    /// Rename a field in place. No-op (false) when `old` is absent, `new`
    /// is empty, or the names are equal.
    ///
    /// A caller that already knows the full post-rename arrangement passes
    /// it as `order` and the tracker is replaced wholesale; otherwise the
    /// tracker entry is renamed in position.
    pub async fn rename_key(
        &self,
        doc: &str,
        preset: &str,
        old: &str,
        new: &str,
        order: Option<Vec<String>>,
        node_id: Option<String>,
    ) -> bool {
        let result = self
            .store
            .update(doc, |document| {
                document
                    .presets
                    .get_mut(preset)
                    .map(|p| p.rename_field(old, new))
                    .unwrap_or(false)
            })
            .await;

        match result {
            Ok(true) => {
                match order {
                    Some(order) => self.tracker.set(order).await,
                    None => self.tracker.rename_in_place(old, new).await,
                }
                self.after_mutation(doc, preset, node_id).await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!("Failed to rename '{}' in {}: {}", old, doc, e);
                false
            }
        }
    }

    /// Delete an entire preset from a document. Reports false when the
    /// title (or the document) is absent. Successful deletion refreshes
    /// the enums so selection UIs drop the title.
    pub async fn delete_title(&self, doc: &str, title: &str) -> bool {
        let result = self
            .store
            .update(doc, |document| {
                document.presets.shift_remove(title).is_some()
            })
            .await;

        match result {
            Ok(true) => {
                self.refresh_enums().await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!("Failed to delete title '{}' from {}: {}", title, doc, e);
                false
            }
        }
    }

    /// Persist a prompt under a title, creating the preset when new.
    ///
    /// The prompt lands as a single string field named `prompt`. No
    /// broadcast: the directory watcher picks up the write.
    pub async fn save_prompt(&self, doc: &str, title: &str, prompt: &str) -> bool {
        let result = self
            .store
            .update(doc, |document| {
                document.ensure_preset(title).values.insert(
                    "prompt".to_string(),
                    Field::new(ValueType::String, prompt),
                );
                true
            })
            .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Failed to save prompt '{}' to {}: {}", title, doc, e);
                false
            }
        }
    }

    /// Replace the panel order wholesale. Stores the order only — no
    /// schema recompute, no broadcast.
    pub async fn set_panel_order(&self, order: Vec<String>) {
        self.tracker.set(order).await;
    }

    /// Build the widget payload for a preset without broadcasting it.
    pub async fn widget_data(
        &self,
        doc: &str,
        preset: &str,
        node_id: Option<String>,
    ) -> WidgetSyncPayload {
        let schema = self.resolve_schema(doc, preset).await;
        let panel = self.store.panel(doc, preset).await;
        let keys_order: Vec<String> = panel.keys().cloned().collect();

        WidgetSyncPayload {
            title: preset.to_string(),
            values: panel,
            keys_order,
            outputs: schema.iter().map(|e| e.output_type).collect(),
            output_names: schema.iter().map(|e| e.name.clone()).collect(),
            refresh_outputs: true,
            node_id,
        }
    }

    /// Build and broadcast the widget payload for a preset.
    pub async fn widget_sync(
        &self,
        doc: &str,
        preset: &str,
        node_id: Option<String>,
    ) -> WidgetSyncPayload {
        let payload = self.widget_data(doc, preset, node_id).await;
        self.broadcaster
            .publish(PushEvent::WidgetSync(payload.clone()))
            .await;
        payload
    }

    async fn after_mutation(&self, doc: &str, preset: &str, node_id: Option<String>) {
        self.widget_sync(doc, preset, node_id).await;
        self.refresh_enums().await;
    }

    /// The per-cycle evaluation entry point.
    ///
    /// The explicit preset name takes priority over the pre-enumerated
    /// selector. A brand-new preset name is created as a side effect of
    /// its first evaluation. The returned schema and values are computed
    /// with the same processing order and always have equal length.
    pub async fn evaluate(
        &self,
        doc: &str,
        preset_selector: &str,
        explicit_name: &str,
        consumer_id: &str,
    ) -> Result<Evaluation> {
        let title = if explicit_name.is_empty() {
            preset_selector
        } else {
            explicit_name
        };

        if !title.is_empty() && !doc.is_empty() {
            if let Err(e) = self.store.ensure_preset(doc, title).await {
                tracing::warn!("Failed to ensure preset '{}' in {}: {}", title, doc, e);
            }
        }

        let schema = self.resolve_schema(doc, title).await;

        let panel = self.store.panel(doc, title).await;
        let tracker_order = self.tracker.get().await;
        let mut values = Vec::with_capacity(schema.len());
        for name in processing_order(&tracker_order, &panel) {
            if let Some(field) = panel.get(&name) {
                values.push(convert_value(doc, title, &name, field)?);
            }
        }

        if values.is_empty() {
            values.push(OutputValue::Text(String::new()));
        }
        reconcile_arity(&schema, &mut values);

        tracing::debug!(
            "Evaluated {}::{} for consumer {}: {} outputs",
            doc,
            title,
            consumer_id,
            schema.len()
        );

        Ok(Evaluation { schema, values })
    }
}

/// Watcher callback: funnel external edits into the refresh path.
struct RefreshOnChange {
    service: Weak<PresetService>,
}

#[async_trait]
impl WatchCallback for RefreshOnChange {
    async fn on_change(&self) {
        if let Some(service) = self.service.upgrade() {
            service.refresh_enums().await;
        }
    }
}
