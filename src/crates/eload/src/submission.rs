//! Submission handle: detection of submitted files and progress reporting

use crate::config::PathsConfig;
use crate::error::{EloadError, Result};
use crate::facts;
use crate::layout::SUBMISSION_LAYOUT;
use crate::stage::Stage;
use eload_checkpoint::{Checkpoint, CheckpointBackend, EloadId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Operator-supplied facts for detection
#[derive(Debug, Clone, Default)]
pub struct DetectRequest {
    /// Candidate reference assemblies; duplicates are ignored
    pub assembly_accessions: Vec<String>,
    pub taxonomy_id: Option<u32>,
    pub scientific_name: Option<String>,
}

/// What detection recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectReport {
    pub vcf_files: Vec<PathBuf>,
    pub metadata_spreadsheet: PathBuf,
    pub assembly_accession: Option<String>,
}

/// Progress of one submission as recorded in its checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub eload: String,
    pub checkpoint: String,
    pub project_accession: Option<String>,
    pub project_dir: Option<String>,
    pub db_name: Option<String>,
    pub db_exists: Option<bool>,
    /// Recorded outcome per stage, in execution order
    pub stages: Vec<(Stage, Option<String>)>,
}

/// Entry point for submission-level operations
pub struct Eload {
    id: EloadId,
    root: PathBuf,
    checkpoint: Checkpoint,
}

impl Eload {
    pub async fn open(paths: &PathsConfig, backend: Arc<dyn CheckpointBackend>, id: EloadId) -> Result<Self> {
        let checkpoint = Checkpoint::open(backend, id).await?;
        Ok(Self {
            id,
            root: paths.eloads_dir.join(id.to_string()),
            checkpoint,
        })
    }

    pub fn id(&self) -> EloadId {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Record the submitted VCFs, the metadata spreadsheet and the assembly facts.
    ///
    /// Nothing is recorded unless every check passes. More than one
    /// spreadsheet or more than one distinct assembly is rejected.
    pub async fn detect(&mut self, request: &DetectRequest) -> Result<DetectReport> {
        SUBMISSION_LAYOUT.ensure(&self.root).await?;

        let vcf_dir = SUBMISSION_LAYOUT.path_for(&self.root, "vcf")?;
        let vcf_files = list_files(&vcf_dir, |name| name.ends_with(".vcf") || name.ends_with(".vcf.gz")).await?;
        if vcf_files.is_empty() {
            return Err(EloadError::precondition(format!(
                "no VCF files found in {}",
                vcf_dir.display()
            )));
        }

        let metadata_dir = SUBMISSION_LAYOUT.path_for(&self.root, "metadata")?;
        let spreadsheets = list_files(&metadata_dir, |name| name.ends_with(".xlsx")).await?;
        let metadata_spreadsheet = match spreadsheets.as_slice() {
            [single] => single.clone(),
            [] => {
                return Err(EloadError::precondition(format!(
                    "no metadata spreadsheet found in {}",
                    metadata_dir.display()
                )))
            }
            many => {
                return Err(EloadError::precondition(format!(
                    "{} metadata spreadsheets found, expected one: {}",
                    many.len(),
                    join_paths(many)
                )))
            }
        };

        let candidates: BTreeSet<&str> = request
            .assembly_accessions
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if candidates.len() > 1 {
            return Err(EloadError::precondition(format!(
                "{} candidate reference assemblies, expected one: {}",
                candidates.len(),
                candidates.iter().copied().collect::<Vec<_>>().join(", ")
            )));
        }
        let assembly_accession = candidates.into_iter().next().map(str::to_string);

        let vcf_names: Vec<String> = vcf_files.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        self.checkpoint
            .set_serialized(facts::SUBMITTED_VCF_FILES, &vcf_names)
            .await?;
        self.checkpoint
            .set(
                facts::METADATA_SPREADSHEET,
                metadata_spreadsheet.to_string_lossy().into_owned(),
            )
            .await?;
        if let Some(assembly) = &assembly_accession {
            self.checkpoint
                .set(facts::ASSEMBLY_ACCESSION, assembly.as_str())
                .await?;
        }
        if let Some(taxonomy_id) = request.taxonomy_id {
            self.checkpoint.set(facts::TAXONOMY_ID, taxonomy_id).await?;
        }
        if let Some(name) = &request.scientific_name {
            self.checkpoint.set(facts::SCIENTIFIC_NAME, name.as_str()).await?;
        }

        info!(
            eload = %self.id,
            vcfs = vcf_files.len(),
            spreadsheet = %metadata_spreadsheet.display(),
            assembly = ?assembly_accession,
            "Detection recorded"
        );
        Ok(DetectReport {
            vcf_files,
            metadata_spreadsheet,
            assembly_accession,
        })
    }

    pub fn status(&self) -> Result<StatusReport> {
        let database = facts::database_facts(self.checkpoint.document())?;
        let stages = Stage::ALL
            .iter()
            .map(|stage| {
                let outcome = self
                    .checkpoint
                    .query_str(&stage.outcome_path())
                    .map(str::to_string);
                (*stage, outcome)
            })
            .collect();

        Ok(StatusReport {
            eload: self.id.to_string(),
            checkpoint: self.checkpoint.location(),
            project_accession: self.checkpoint.query_str(facts::PROJECT_ACCESSION).map(str::to_string),
            project_dir: self.checkpoint.query_str(facts::PROJECT_DIR).map(str::to_string),
            db_name: database.db_name,
            db_exists: database.exists,
            stages,
        })
    }
}

async fn list_files(dir: &Path, matches: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| EloadError::io(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| EloadError::io(dir, e))? {
        let path = entry.path();
        let name_matches = path.file_name().and_then(|n| n.to_str()).map(&matches).unwrap_or(false);
        if name_matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
