//! Document store: directory-backed persistence with atomic replace.
//!
//! One physical YAML file per document; the directory is the unit of
//! enumeration. Writes go through a store-wide lock and a
//! temp-write-then-rename cycle, so readers only ever observe complete
//! documents. A corrupt file is quarantined (renamed aside with a
//! timestamp) instead of failing the whole store.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use flexpreset_core::{codec, Document, Field, Panel, PresetError, Result, ValueType};
use tokio::sync::Mutex;

/// File extension for preset documents.
pub const DOCUMENT_EXTENSION: &str = "yaml";

/// Name of the document seeded into an empty directory.
pub const DEFAULT_DOCUMENT: &str = "default.yaml";

/// Placeholder written over a quarantined document.
const RECOVERED_PLACEHOLDER: &str = "# Recovered from corrupt file\n";

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the documents.
    pub dir: PathBuf,

    /// Optional legacy directory. When it exists and `dir` does not, it is
    /// renamed to `dir` once at open (the only supported migration).
    pub legacy_dir: Option<PathBuf>,

    /// Field name seeded into the example preset of a brand-new directory.
    pub seed_field: String,

    /// Placeholder value for the seeded field.
    pub seed_value: String,
}

impl StoreConfig {
    /// Configuration for a plain directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            legacy_dir: None,
            seed_field: "sample_key".to_string(),
            seed_value: "Enter your value here".to_string(),
        }
    }

    /// Add a legacy directory to migrate from.
    pub fn with_legacy_dir(mut self, legacy_dir: impl Into<PathBuf>) -> Self {
        self.legacy_dir = Some(legacy_dir.into());
        self
    }

    /// Override the seeded example field. Each namespace seeds its own
    /// placeholder (`sample_key` for presets, `prompt` for prompt lists).
    pub fn with_seed(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.seed_field = field.into();
        self.seed_value = value.into();
        self
    }
}

/// File-backed document store. One instance per directory.
pub struct PresetStore {
    dir: PathBuf,
    seed_field: String,
    seed_value: String,
    write_lock: Mutex<()>,
}

impl PresetStore {
    /// Open (and create if needed) the store directory.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(legacy) = &config.legacy_dir {
            if legacy.is_dir() && !config.dir.exists() {
                tracing::info!(
                    "Migrating legacy directory {} to {}",
                    legacy.display(),
                    config.dir.display()
                );
                std::fs::rename(legacy, &config.dir)?;
            }
        }
        std::fs::create_dir_all(&config.dir)?;

        Ok(Self {
            dir: config.dir,
            seed_field: config.seed_field,
            seed_value: config.seed_value,
            write_lock: Mutex::new(()),
        })
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, doc: &str) -> PathBuf {
        self.dir.join(doc)
    }

    /// Whether a document file currently exists.
    pub async fn exists(&self, doc: &str) -> bool {
        tokio::fs::try_exists(self.path_for(doc)).await.unwrap_or(false)
    }

    /// Lexicographically sorted document file names.
    ///
    /// Seeds a default document with one example preset when the directory
    /// holds no documents at all.
    pub async fn list_documents(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
            {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(name.to_string());
                }
            }
        }

        if files.is_empty() {
            self.write(DEFAULT_DOCUMENT, &self.default_document()).await?;
            files.push(DEFAULT_DOCUMENT.to_string());
            tracing::info!("Seeded {} in {}", DEFAULT_DOCUMENT, self.dir.display());
        }

        files.sort();
        Ok(files)
    }

    /// Number of document files currently on disk. Unlike
    /// [`list_documents`](Self::list_documents), never seeds.
    pub async fn document_count(&self) -> usize {
        let mut count = 0;
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return 0;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
            {
                count += 1;
            }
        }
        count
    }

    /// Read a document.
    ///
    /// An absent file reads as an empty document. A file that fails to
    /// parse is quarantined and also reads as empty; parse errors never
    /// cross this boundary.
    pub async fn read(&self, doc: &str) -> Document {
        let path = self.path_for(doc);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Document::new(),
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path.display(), e);
                return Document::new();
            }
        };

        match codec::decode(&text) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Corrupt document {}: {}", doc, e);
                self.quarantine(doc).await;
                Document::new()
            }
        }
    }

    /// Rename a corrupt document aside and replace it with a valid
    /// placeholder.
    async fn quarantine(&self, doc: &str) {
        let path = self.path_for(doc);
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let bad_path = self.dir.join(format!("bad_{}_{}", timestamp, doc));

        if let Err(e) = tokio::fs::rename(&path, &bad_path).await {
            tracing::error!("Failed to quarantine {}: {}", doc, e);
            return;
        }
        if let Err(e) = tokio::fs::write(&path, RECOVERED_PLACEHOLDER).await {
            tracing::error!("Failed to write placeholder for {}: {}", doc, e);
        }
        tracing::info!("Quarantined corrupt document {} as {}", doc, bad_path.display());
    }

    /// Write a document atomically: serialize to a temporary file in the
    /// same directory, then rename over the target. Serialized against all
    /// other writes through this store.
    pub async fn write(&self, doc: &str, document: &Document) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_unlocked(doc, document).await
    }

    async fn write_unlocked(&self, doc: &str, document: &Document) -> Result<()> {
        let text = codec::encode(document)?;
        let dir = self.dir.clone();
        let path = self.path_for(doc);

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(text.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| PresetError::Io {
            message: e.to_string(),
        })??;

        Ok(())
    }

    /// One atomic read-modify-write-replace cycle over a document.
    ///
    /// The mutation closure returns whether it changed anything; the
    /// rewrite is skipped (and no watcher event produced) when it did not.
    pub async fn update<F>(&self, doc: &str, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Document) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read(doc).await;
        if !mutate(&mut document) {
            return Ok(false);
        }
        self.write_unlocked(doc, &document).await?;
        Ok(true)
    }

    /// Create an empty preset if absent. Idempotent.
    pub async fn ensure_preset(&self, doc: &str, preset: &str) -> Result<bool> {
        self.update(doc, |document| {
            if document.preset(preset).is_some() {
                return false;
            }
            document.ensure_preset(preset);
            true
        })
        .await?;
        Ok(true)
    }

    /// Preset names of a document, in document order.
    pub async fn titles(&self, doc: &str) -> Vec<String> {
        self.read(doc).await.titles()
    }

    /// The field panel of a preset; empty when document or preset is absent.
    pub async fn panel(&self, doc: &str, preset: &str) -> Panel {
        self.read(doc)
            .await
            .preset(preset)
            .map(|p| p.values.clone())
            .unwrap_or_default()
    }

    /// The document seeded into a brand-new directory.
    fn default_document(&self) -> Document {
        let mut document = Document::new();
        document.ensure_preset("example").values.insert(
            self.seed_field.clone(),
            Field::new(ValueType::String, self.seed_value.clone()),
        );
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> PresetStore {
        PresetStore::open(StoreConfig::new(dir)).unwrap()
    }

    #[tokio::test]
    async fn test_empty_directory_seeds_default() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs, [DEFAULT_DOCUMENT]);

        let document = store.read(DEFAULT_DOCUMENT).await;
        let preset = document.preset("example").unwrap();
        assert_eq!(preset.values["sample_key"].declared_type, ValueType::String);
        assert_eq!(preset.values["sample_key"].value, "Enter your value here");
    }

    #[tokio::test]
    async fn test_custom_seed_field() {
        let dir = tempdir().unwrap();
        let store = PresetStore::open(
            StoreConfig::new(dir.path()).with_seed("prompt", "Enter your prompt here"),
        )
        .unwrap();

        store.list_documents().await.unwrap();

        let preset = store.read(DEFAULT_DOCUMENT).await;
        let preset = preset.preset("example").unwrap();
        assert_eq!(preset.values["prompt"].value, "Enter your prompt here");
        assert!(!preset.values.contains_key("sample_key"));
    }

    #[tokio::test]
    async fn test_document_count_never_seeds() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        assert_eq!(store.document_count().await, 0);
        assert!(!store.exists(DEFAULT_DOCUMENT).await);

        std::fs::write(dir.path().join("a.yaml"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a document").unwrap();
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let mut document = Document::new();
        document
            .ensure_preset("portrait")
            .values
            .insert("steps".to_string(), Field::new(ValueType::Int, "20"));
        store.write("scene.yaml", &document).await.unwrap();

        assert_eq!(store.read("scene.yaml").await, document);
        assert_eq!(store.titles("scene.yaml").await, ["portrait"]);
    }

    #[tokio::test]
    async fn test_absent_document_reads_empty() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(store.read("nothing.yaml").await.is_empty());
        assert!(store.panel("nothing.yaml", "any").await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_quarantined() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let original = "example: [unclosed\n";
        std::fs::write(dir.path().join("broken.yaml"), original).unwrap();

        assert!(store.read("broken.yaml").await.is_empty());

        // The original bytes survive under a bad_<timestamp>_<name> sibling.
        let quarantined: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.unwrap().file_name().into_string().ok())
            .filter(|name| name.starts_with("bad_"))
            .collect();
        assert_eq!(quarantined.len(), 1);
        assert!(quarantined[0].ends_with("_broken.yaml"));
        let saved = std::fs::read_to_string(dir.path().join(&quarantined[0])).unwrap();
        assert_eq!(saved, original);

        // The replacement placeholder parses as an empty document.
        assert!(store.read("broken.yaml").await.is_empty());
        assert!(dir.path().join("broken.yaml").exists());
    }

    #[tokio::test]
    async fn test_stray_temp_file_leaves_target_intact() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let mut document = Document::new();
        document.ensure_preset("keep");
        store.write("doc.yaml", &document).await.unwrap();

        // A writer that died between temp-write and rename leaves only a
        // temp file behind; the committed document must be unaffected.
        std::fs::write(dir.path().join(".tmpXXXXXX"), "partial garbage").unwrap();
        assert_eq!(store.read("doc.yaml").await, document);
    }

    #[tokio::test]
    async fn test_ensure_preset_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(store.ensure_preset("doc.yaml", "fresh").await.unwrap());
        let after_first = store.read("doc.yaml").await;
        assert!(after_first.preset("fresh").is_some());

        assert!(store.ensure_preset("doc.yaml", "fresh").await.unwrap());
        assert_eq!(store.read("doc.yaml").await, after_first);
    }

    #[tokio::test]
    async fn test_update_skips_write_when_unchanged() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let changed = store.update("doc.yaml", |_| false).await.unwrap();
        assert!(!changed);
        assert!(!store.exists("doc.yaml").await);
    }

    #[tokio::test]
    async fn test_legacy_directory_migration() {
        let root = tempdir().unwrap();
        let legacy = root.path().join("yaml");
        std::fs::create_dir(&legacy).unwrap();
        std::fs::write(legacy.join("old.yaml"), "kept:\n  values:\n").unwrap();

        let dir = root.path().join("presets");
        let store = PresetStore::open(
            StoreConfig::new(&dir).with_legacy_dir(&legacy),
        )
        .unwrap();

        assert!(!legacy.exists());
        assert_eq!(store.list_documents().await.unwrap(), ["old.yaml"]);
        assert!(store.read("old.yaml").await.preset("kept").is_some());
    }

    #[tokio::test]
    async fn test_list_documents_ignores_other_extensions() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        std::fs::write(dir.path().join("a.yaml"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a document").unwrap();

        assert_eq!(store.list_documents().await.unwrap(), ["a.yaml"]);
    }
}
