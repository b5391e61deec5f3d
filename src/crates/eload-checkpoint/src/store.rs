//! Checkpoint persistence
//!
//! A [`CheckpointBackend`] knows how to read and durably replace the whole
//! document of one submission. [`Checkpoint`] is the per-submission handle the
//! orchestrator works with: every [`Checkpoint::set`] is a read-modify-write
//! of the full document that is written through to the backend before the
//! in-memory copy is updated, so a failed write never leaves the handle ahead
//! of what is on disk.

use crate::document::{display_path, CheckpointDocument};
use crate::error::{CheckpointError, Result};
use crate::id::EloadId;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Storage backend for checkpoint documents, keyed by submission
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// Load the persisted document, or `None` if the submission has none yet
    async fn read(&self, eload: EloadId) -> Result<Option<CheckpointDocument>>;

    /// Durably replace the persisted document
    async fn write(&self, eload: EloadId, document: &CheckpointDocument) -> Result<()>;

    /// Human-readable location of the document, for messages
    fn location(&self, eload: EloadId) -> String;
}

/// One YAML file per submission at `<eloads_dir>/ELOAD_<n>/.ELOAD_<n>_config.yml`
#[derive(Debug, Clone)]
pub struct YamlFileBackend {
    eloads_dir: PathBuf,
}

impl YamlFileBackend {
    pub fn new(eloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            eloads_dir: eloads_dir.into(),
        }
    }

    pub fn document_path(&self, eload: EloadId) -> PathBuf {
        self.eloads_dir
            .join(eload.to_string())
            .join(eload.checkpoint_file_name())
    }
}

#[async_trait]
impl CheckpointBackend for YamlFileBackend {
    async fn read(&self, eload: EloadId) -> Result<Option<CheckpointDocument>> {
        let path = self.document_path(eload);
        match fs::read_to_string(&path).await {
            Ok(text) => CheckpointDocument::from_yaml_str(&text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CheckpointError::io(path.display().to_string(), e)),
        }
    }

    async fn write(&self, eload: EloadId, document: &CheckpointDocument) -> Result<()> {
        let path = self.document_path(eload);
        let text = document.to_yaml_string()?;
        write_atomically(&path, text.as_bytes()).await?;
        debug!(eload = %eload, path = %path.display(), "Checkpoint written");
        Ok(())
    }

    fn location(&self, eload: EloadId) -> String {
        self.document_path(eload).display().to_string()
    }
}

/// Write to a uniquely named sibling, fsync, then rename over the target
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |e| CheckpointError::io(path.display().to_string(), e);
    let parent = path
        .parent()
        .ok_or_else(|| CheckpointError::Invalid(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent).await.map_err(io_err)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!("{}.tmp.{}", file_name, Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(io_err(e));
    }
    Ok(())
}

/// In-memory backend for tests; can be told to fail every write
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    documents: RwLock<HashMap<EloadId, CheckpointDocument>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document as if a previous run had written it
    pub async fn insert(&self, eload: EloadId, document: CheckpointDocument) {
        self.documents.write().await.insert(eload, document);
    }

    pub async fn snapshot(&self, eload: EloadId) -> Option<CheckpointDocument> {
        self.documents.read().await.get(&eload).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointBackend for InMemoryBackend {
    async fn read(&self, eload: EloadId) -> Result<Option<CheckpointDocument>> {
        Ok(self.documents.read().await.get(&eload).cloned())
    }

    async fn write(&self, eload: EloadId, document: &CheckpointDocument) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CheckpointError::io(
                self.location(eload),
                std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            ));
        }
        self.documents.write().await.insert(eload, document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self, eload: EloadId) -> String {
        format!("memory://{}", eload)
    }
}

/// Checkpoint handle for one submission
pub struct Checkpoint {
    eload: EloadId,
    backend: Arc<dyn CheckpointBackend>,
    document: CheckpointDocument,
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("eload", &self.eload)
            .field("location", &self.backend.location(self.eload))
            .finish()
    }
}

impl Checkpoint {
    /// Load the submission's document; an absent document is an empty one
    pub async fn open(backend: Arc<dyn CheckpointBackend>, eload: EloadId) -> Result<Self> {
        let document = backend.read(eload).await?.unwrap_or_default();
        Ok(Self {
            eload,
            backend,
            document,
        })
    }

    pub fn eload(&self) -> EloadId {
        self.eload
    }

    pub fn location(&self) -> String {
        self.backend.location(self.eload)
    }

    pub fn document(&self) -> &CheckpointDocument {
        &self.document
    }

    /// Current value at `path`; never an error for a missing path
    pub fn query(&self, path: &[&str]) -> Option<&Value> {
        self.document.get(path)
    }

    pub fn query_str(&self, path: &[&str]) -> Option<&str> {
        self.document.get_str(path)
    }

    pub fn query_as<T: DeserializeOwned>(&self, path: &[&str]) -> Result<Option<T>> {
        self.document.query_as(path)
    }

    /// Update one key and write the whole document through
    pub async fn set(&mut self, path: &[&str], value: impl Into<Value>) -> Result<()> {
        let mut next = self.document.clone();
        next.set(path, value)?;
        self.commit(next, path).await
    }

    pub async fn set_serialized<T: Serialize + ?Sized>(&mut self, path: &[&str], value: &T) -> Result<()> {
        let mut next = self.document.clone();
        next.set_serialized(path, value)?;
        self.commit(next, path).await
    }

    /// Re-read the document from the backend, dropping nothing that was written
    pub async fn reload(&mut self) -> Result<()> {
        self.document = self.backend.read(self.eload).await?.unwrap_or_default();
        Ok(())
    }

    async fn commit(&mut self, mut next: CheckpointDocument, path: &[&str]) -> Result<()> {
        next.stamp_version();
        self.backend.write(self.eload, &next).await?;
        self.document = next;
        debug!(eload = %self.eload, key = %display_path(path), "Checkpoint fact recorded");
        Ok(())
    }
}
