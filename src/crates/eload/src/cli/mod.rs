//! CLI command implementations
//!
//! Provides command handlers for the eload binary. Handlers receive a
//! [`CliContext`] holding the loaded configuration; store clients are only
//! built by the commands that need them.

pub mod detect;
pub mod ext_reference;
pub mod ingest;
pub mod status;

use crate::config::EloadConfig;
use crate::error::Result;
use crate::resolver::{MongoVariantStore, PostgresMetadataStore, ResourceResolver};
use eload_checkpoint::{CheckpointBackend, YamlFileBackend};
use std::sync::Arc;

/// Shared state for command handlers
pub struct CliContext {
    pub config: Arc<EloadConfig>,
    pub backend: Arc<dyn CheckpointBackend>,
}

impl CliContext {
    pub fn new(config: EloadConfig) -> Self {
        let backend = Arc::new(YamlFileBackend::new(config.paths.eloads_dir.clone()));
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    pub fn metadata_store(&self) -> Result<Arc<PostgresMetadataStore>> {
        Ok(Arc::new(PostgresMetadataStore::connect_lazy(
            &self.config.metadata_store,
        )?))
    }

    pub fn resolver(&self) -> Result<ResourceResolver> {
        let variants = Arc::new(MongoVariantStore::new(&self.config.variant_store));
        Ok(ResourceResolver::new(self.metadata_store()?, variants))
    }
}
