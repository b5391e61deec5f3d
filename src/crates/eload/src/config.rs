//! Configuration management
//!
//! Supports layered configuration:
//! - User-level: ~/.eload/eload.toml
//! - Explicit: `--config <path>`
//!
//! Components never read configuration globally; each receives the section it
//! needs from [`EloadConfig`] when it is constructed.

mod loader;
mod schema;

pub use loader::{ConfigLoader, CONFIG_DIR, CONFIG_FILE};
pub use schema::{
    EloadConfig, LoggingConfig, MetadataStoreConfig, NextflowConfig, PathsConfig, PipelineConfig,
    ResolverConfig, VariantStoreConfig,
};

use crate::Result;
use std::path::PathBuf;

/// Load configuration from the user-level file and an optional explicit file
pub async fn load_config(explicit: Option<PathBuf>) -> Result<EloadConfig> {
    ConfigLoader::new(explicit).load().await
}
