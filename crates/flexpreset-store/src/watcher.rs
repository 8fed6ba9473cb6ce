//! Directory change watcher.
//!
//! Watches the store directory for create/modify/delete events on document
//! files and invokes a callback. Delivery is at-least-once — editors that
//! save via temp-then-rename produce bursts — so the callback must be
//! idempotent and cheap to re-run.

use std::path::Path;

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};

use flexpreset_core::{PresetError, Result};

use crate::store::DOCUMENT_EXTENSION;

/// Callback invoked from the watcher task.
#[async_trait]
pub trait WatchCallback: Send + Sync + 'static {
    /// A document file was created, modified or removed. No payload: the
    /// callback derives fresh state by reading back through the store.
    async fn on_change(&self);

    /// The watcher hit an error it could not recover from.
    async fn on_error(&self, message: String) {
        tracing::error!("Watcher error: {}", message);
    }
}

/// Watches one store directory for document changes.
pub struct DocumentWatcher {
    handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl DocumentWatcher {
    /// Create an inactive watcher. Call [`start`](Self::start) to begin
    /// monitoring.
    pub fn new() -> Self {
        Self {
            handle: None,
            shutdown_tx: None,
        }
    }

    /// Start watching `dir`, replacing any previous watch.
    ///
    /// Events are marshalled off the notify thread through a channel; the
    /// callback runs on the tokio runtime, never on the watcher thread.
    pub fn start<C>(&mut self, dir: &Path, callback: C) -> Result<()>
    where
        C: WatchCallback,
    {
        self.stop();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (tx, mut rx) = mpsc::channel::<Event>(100);

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = result {
                    // The receiver lagging just drops a redundant refresh.
                    let _ = tx.blocking_send(event);
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| PresetError::Watch {
            message: e.to_string(),
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| PresetError::Watch {
                message: format!("Failed to watch {}: {}", dir.display(), e),
            })?;
        tracing::info!("Watching directory {}", dir.display());

        let handle = tokio::spawn(async move {
            // Keep the watcher alive for the duration of this task.
            let _watcher = watcher;

            loop {
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Some(event) if is_document_event(&event) => {
                                tracing::debug!("Document change: {:?}", event.paths);
                                callback.on_change().await;
                            }
                            Some(_) => {}
                            None => break,
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            tracing::debug!("Watcher task exiting");
        });

        self.handle = Some(handle);
        self.shutdown_tx = Some(shutdown_tx);

        Ok(())
    }

    /// Stop watching. Safe to call repeatedly, and safe if never started.
    pub fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether the watcher is currently running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Default for DocumentWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DocumentWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Create/modify/remove on a path with the document extension.
fn is_document_event(event: &Event) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION))
}
