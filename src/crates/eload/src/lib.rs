//! # eload - staged ingestion of variant submissions
//!
//! Drives a brokered ELOAD submission through the three ingestion stages:
//! study metadata load, variant accessioning and variant load. Every fact and
//! stage outcome is recorded in the submission's checkpoint document, so a
//! later invocation picks up where an earlier one stopped.
//!
//! ## Features
//!
//! - **Precondition gate** - every requested stage is checked against the
//!   recorded facts before any external process starts
//! - **Resource resolution** - variant database names come from the metadata
//!   store and are verified against the variant store catalog
//! - **Structured invocations** - stage processes run from argument lists,
//!   with output captured to per-stage log files
//! - **Durable outcomes** - `success` or `failure` is written for each
//!   executed stage before control returns
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eload::{EloadIngestion, IngestionRequest, ResourceResolver, Stage, SystemProcessRunner};
//! use eload::resolver::{MongoVariantStore, PostgresMetadataStore};
//! use eload_checkpoint::{EloadId, YamlFileBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Arc::new(eload::config::load_config(None).await?);
//! let backend = Arc::new(YamlFileBackend::new(&config.paths.eloads_dir));
//! let resolver = ResourceResolver::new(
//!     Arc::new(PostgresMetadataStore::connect_lazy(&config.metadata_store)?),
//!     Arc::new(MongoVariantStore::new(&config.variant_store)),
//! );
//!
//! let ingestion = EloadIngestion::new(config, backend, resolver, Arc::new(SystemProcessRunner));
//! let report = ingestion
//!     .ingest(EloadId::new(5), &IngestionRequest::new(vec![Stage::MetadataLoad]))
//!     .await?;
//! println!("ran {:?}", report.stages);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod executor;
pub mod ext_reference;
pub mod facts;
pub mod gate;
pub mod ingestion;
pub mod layout;
pub mod logging;
pub mod process;
pub mod resolver;
pub mod retry;
pub mod stage;
pub mod submission;
pub mod templates;
pub mod testing;

mod error;

// Re-export key types for convenience
pub use ingestion::{EloadIngestion, IngestionReport};
pub use layout::{DirectoryLayout, PROJECT_LAYOUT, SUBMISSION_LAYOUT};
pub use process::{Invocation, ProcessOutcome, ProcessRunner, SystemProcessRunner};
pub use resolver::{DatabaseName, MetadataStore, Registration, ResourceResolver, VariantStore};
pub use stage::{Aggregation, IngestionRequest, Stage, StageOutcome, VepVersions};
pub use submission::{DetectReport, DetectRequest, Eload, StatusReport};

pub use eload_checkpoint::{Checkpoint, CheckpointBackend, EloadId};

// Error types
pub use error::{EloadError, Result};
