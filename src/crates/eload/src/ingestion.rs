//! Ingestion orchestrator
//!
//! One run handles one submission:
//!
//! 1. open the checkpoint document
//! 2. check the recorded upstream facts
//! 3. establish the variant store database when a stage needs one
//! 4. gate every requested stage, then register an explicit database name
//! 5. record run parameters and prepare the project directory
//! 6. execute the approved stages strictly in order
//!
//! Any error aborts the run. Everything recorded before the error stays
//! recorded, so the next run resumes at the failed stage.

use crate::config::EloadConfig;
use crate::error::{EloadError, Result};
use crate::executor::{self, StageEnv};
use crate::facts::{self, SubmissionFacts};
use crate::gate;
use crate::layout::{PROJECT_LAYOUT, SUBMISSION_LAYOUT};
use crate::process::ProcessRunner;
use crate::resolver::{DatabaseName, ResourceResolver};
use crate::stage::{IngestionRequest, Stage};
use chrono::Utc;
use eload_checkpoint::{Checkpoint, CheckpointBackend, EloadId, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub eload: EloadId,
    pub stages: Vec<Stage>,
    pub project_dir: PathBuf,
}

/// Orchestrates ingestion stages for submissions
pub struct EloadIngestion {
    config: Arc<EloadConfig>,
    backend: Arc<dyn CheckpointBackend>,
    resolver: ResourceResolver,
    runner: Arc<dyn ProcessRunner>,
}

impl EloadIngestion {
    pub fn new(
        config: Arc<EloadConfig>,
        backend: Arc<dyn CheckpointBackend>,
        resolver: ResourceResolver,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            backend,
            resolver,
            runner,
        }
    }

    /// Root directory of a submission
    pub fn submission_root(&self, eload: EloadId) -> PathBuf {
        self.config.paths.eloads_dir.join(eload.to_string())
    }

    /// Run the requested stages; an empty request means every stage
    pub async fn ingest(&self, eload: EloadId, request: &IngestionRequest) -> Result<IngestionReport> {
        let mut request = request.clone();
        if request.stages.is_empty() {
            request.stages = Stage::ALL.to_vec();
        }

        let mut checkpoint = Checkpoint::open(self.backend.clone(), eload).await?;
        info!(eload = %eload, checkpoint = %checkpoint.location(), stages = ?request.ordered_stages(), "Starting ingestion");

        gate::evaluate_recorded_facts(checkpoint.document(), &request)?;
        let pending = if request.needs_database() {
            self.establish_database(&mut checkpoint, request.db_name.as_deref())
                .await?
        } else {
            None
        };

        let plan = gate::evaluate(checkpoint.document(), &request)?;
        if let Some(registration) = pending {
            self.resolver
                .register_database_mapping(
                    &registration.assembly_accession,
                    registration.taxonomy_id,
                    &registration.db_name,
                )
                .await?;
        }

        self.record_parameters(&mut checkpoint, &request, &plan).await?;
        let submission_root = self.submission_root(eload);
        SUBMISSION_LAYOUT.ensure(&submission_root).await?;
        let project_dir = self.setup_project_dir(&mut checkpoint).await?;

        let env = StageEnv {
            config: &self.config,
            submission_root: &submission_root,
            project_dir: &project_dir,
            runner: self.runner.as_ref(),
            metadata: self.resolver.metadata().as_ref(),
        };
        for stage in &plan {
            let executor = executor::executor_for(*stage);
            executor::execute(executor.as_ref(), &mut checkpoint, &env).await?;
        }

        info!(eload = %eload, "Ingestion complete");
        Ok(IngestionReport {
            eload,
            stages: plan,
            project_dir,
        })
    }

    /// Record which database the submission loads into and whether it exists.
    ///
    /// An explicit name wins and is returned for registration once the gate
    /// passes; otherwise a recorded name is reused, and only as a last resort
    /// is one looked up.
    async fn establish_database(
        &self,
        checkpoint: &mut Checkpoint,
        explicit: Option<&str>,
    ) -> Result<Option<PendingRegistration>> {
        let submission = facts::submission_facts(checkpoint.document())?;
        let (assembly, taxonomy) = assembly_and_taxonomy(&submission)?;

        let (name, pending) = match explicit {
            Some(name) => {
                let db_name = DatabaseName::parse(name)?;
                let pending = PendingRegistration {
                    assembly_accession: assembly.to_string(),
                    taxonomy_id: taxonomy,
                    db_name: db_name.clone(),
                };
                (db_name.to_string(), Some(pending))
            }
            None => match checkpoint.query_str(facts::DB_NAME) {
                Some(recorded) => (recorded.to_string(), None),
                None => {
                    let resolved = self
                        .resolver
                        .resolve_database_name(assembly, taxonomy)
                        .await?
                        .ok_or_else(|| {
                            EloadError::precondition(format!(
                                "no variant database registered for taxonomy {} and assembly {}; \
                                 insert the assembly and taxonomy or pass the database name explicitly",
                                taxonomy, assembly
                            ))
                        })?;
                    (resolved, None)
                }
            },
        };

        if checkpoint.query_str(facts::DB_NAME) != Some(name.as_str()) {
            checkpoint.set(facts::DB_NAME, name.as_str()).await?;
        }
        let exists = self.resolver.verify_database_exists(&name).await?;
        checkpoint.set(facts::DB_EXISTS, exists).await?;
        if !exists {
            warn!(db_name = %name, "Create the database or pass the appropriate database name explicitly");
        }
        Ok(pending)
    }

    async fn record_parameters(
        &self,
        checkpoint: &mut Checkpoint,
        request: &IngestionRequest,
        plan: &[Stage],
    ) -> Result<()> {
        checkpoint
            .set(facts::INGESTION_DATE, Utc::now().to_rfc3339())
            .await?;

        if let Some(aggregation) = request.aggregation.filter(|_| request.needs_database()) {
            checkpoint.set(facts::AGGREGATION, aggregation.as_str()).await?;
        }
        if plan.contains(&Stage::Accession) {
            if let Some(instance_id) = request.instance_id {
                checkpoint.set(facts::INSTANCE_ID, instance_id).await?;
            }
        }
        if plan.contains(&Stage::VariantLoad) {
            let (version, cache_version) = match request.vep {
                Some(vep) => (Value::from(vep.version), Value::from(vep.cache_version)),
                None => (Value::Null, Value::Null),
            };
            checkpoint.set(facts::VEP_VERSION, version).await?;
            checkpoint.set(facts::VEP_CACHE_VERSION, cache_version).await?;
        }
        Ok(())
    }

    /// Create the project layout and copy brokered VCFs and indexes into `valid`
    async fn setup_project_dir(&self, checkpoint: &mut Checkpoint) -> Result<PathBuf> {
        let project = facts::required_str(checkpoint, facts::PROJECT_ACCESSION)?;
        let project_dir = self.config.paths.projects_dir.join(&project);
        PROJECT_LAYOUT.ensure(&project_dir).await?;

        let valid_dir = PROJECT_LAYOUT.path_for(&project_dir, "valid")?;
        for (vcf, brokered) in facts::brokered_vcfs(checkpoint.document())? {
            copy_into(Path::new(&vcf), &valid_dir).await?;
            match &brokered.index {
                Some(index) => copy_into(Path::new(index), &valid_dir).await?,
                None => warn!(vcf = %vcf, "Brokered VCF has no index recorded"),
            }
        }

        let recorded = project_dir.to_string_lossy().into_owned();
        if checkpoint.query_str(facts::PROJECT_DIR) != Some(recorded.as_str()) {
            checkpoint.set(facts::PROJECT_DIR, recorded).await?;
        }
        Ok(project_dir)
    }
}

/// Explicit database name awaiting registration in the metadata store
#[derive(Debug)]
struct PendingRegistration {
    assembly_accession: String,
    taxonomy_id: u32,
    db_name: DatabaseName,
}

fn assembly_and_taxonomy(submission: &SubmissionFacts) -> Result<(&str, u32)> {
    match (submission.assembly_accession.as_deref(), submission.taxonomy_id) {
        (Some(assembly), Some(taxonomy)) => Ok((assembly, taxonomy)),
        _ => Err(EloadError::precondition(
            "assembly accession and taxonomy id must be recorded before resolving the variant database",
        )),
    }
}

/// Copy a file into `dir` under its own name, replacing any previous copy
async fn copy_into(source: &Path, dir: &Path) -> Result<()> {
    let name = source
        .file_name()
        .ok_or_else(|| EloadError::precondition(format!("{} is not a file path", source.display())))?;
    let target = dir.join(name);
    tokio::fs::copy(source, &target)
        .await
        .map_err(|e| EloadError::io(source, e))?;
    Ok(())
}
