//! Ingestion stages and run requests

use crate::error::{EloadError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ingestion stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Load project metadata from ENA into the metadata store
    MetadataLoad,
    /// Assign stable variant identifiers
    Accession,
    /// Load, annotate and compute statistics in the variant store
    VariantLoad,
}

impl Stage {
    /// Every stage, in the order a run executes them
    pub const ALL: [Stage; 3] = [Stage::MetadataLoad, Stage::Accession, Stage::VariantLoad];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetadataLoad => "metadata_load",
            Self::Accession => "accession",
            Self::VariantLoad => "variant_load",
        }
    }

    /// Whether the stage writes into a variant store database
    pub fn needs_database(&self) -> bool {
        matches!(self, Self::Accession | Self::VariantLoad)
    }

    /// Checkpoint key holding the stage outcome
    pub fn outcome_path(&self) -> [&'static str; 3] {
        ["ingestion", "stage", self.as_str()]
    }

    /// Sort and deduplicate a requested stage set into execution order
    pub fn in_order(requested: &[Stage]) -> Vec<Stage> {
        let mut stages = requested.to_vec();
        stages.sort();
        stages.dedup();
        stages
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = EloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "metadata_load" => Ok(Self::MetadataLoad),
            "accession" => Ok(Self::Accession),
            "variant_load" => Ok(Self::VariantLoad),
            other => Err(EloadError::configuration(format!(
                "unknown stage '{}' (expected metadata_load, accession or variant_load)",
                other
            ))),
        }
    }
}

/// Terminal outcome recorded for a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Success,
    Failure,
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn from_exit_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How variant statistics were aggregated by the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    None,
    Basic,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
        }
    }

    /// Value understood by the variant load pipeline
    pub fn pipeline_value(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Basic => "BASIC",
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = EloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "basic" => Ok(Self::Basic),
            other => Err(EloadError::configuration(format!(
                "unknown aggregation '{}' (expected none or basic)",
                other
            ))),
        }
    }
}

/// VEP versions pinned for annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VepVersions {
    pub version: u32,
    pub cache_version: u32,
}

/// Parameters of one orchestration run
#[derive(Debug, Clone, Default)]
pub struct IngestionRequest {
    pub stages: Vec<Stage>,
    pub aggregation: Option<Aggregation>,
    pub instance_id: Option<u32>,
    pub vep: Option<VepVersions>,
    /// Operator-supplied variant store database, overriding any recorded one
    pub db_name: Option<String>,
}

impl IngestionRequest {
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_instance_id(mut self, instance_id: u32) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    pub fn with_vep(mut self, version: u32, cache_version: u32) -> Self {
        self.vep = Some(VepVersions {
            version,
            cache_version,
        });
        self
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    /// Requested stages in execution order
    pub fn ordered_stages(&self) -> Vec<Stage> {
        Stage::in_order(&self.stages)
    }

    pub fn needs_database(&self) -> bool {
        self.stages.iter().any(Stage::needs_database)
    }
}
