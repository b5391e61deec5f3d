//! # eload-checkpoint - durable progress records for ELOAD submissions
//!
//! Each submission owns one hierarchical YAML document that records every fact
//! and stage outcome established so far. The document is the single source of
//! truth across process invocations: a later run reads it back to decide what
//! is already done.
//!
//! - [`CheckpointDocument`] - the nested mapping, addressed by key-segment paths
//! - [`Checkpoint`] - per-submission handle; every `set` rewrites the whole
//!   document through its backend before returning
//! - [`CheckpointBackend`] - storage seam, with [`YamlFileBackend`] for
//!   production and [`InMemoryBackend`] for tests
//!
//! ```rust,no_run
//! use eload_checkpoint::{Checkpoint, EloadId, YamlFileBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> eload_checkpoint::Result<()> {
//! let backend = Arc::new(YamlFileBackend::new("/nfs/eloads"));
//! let mut checkpoint = Checkpoint::open(backend, EloadId::new(5)).await?;
//!
//! checkpoint.set(&["ingestion", "database", "db_name"], "eva_hsapiens_grch38").await?;
//! assert_eq!(
//!     checkpoint.query_str(&["ingestion", "database", "db_name"]),
//!     Some("eva_hsapiens_grch38")
//! );
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod id;
pub mod store;

pub use document::{display_path, CheckpointDocument, SCHEMA_VERSION};
pub use error::{CheckpointError, Result};
pub use id::EloadId;
pub use store::{Checkpoint, CheckpointBackend, InMemoryBackend, YamlFileBackend};

pub use serde_yaml::{Mapping, Value};
