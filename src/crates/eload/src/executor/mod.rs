//! Stage executors
//!
//! Each executor turns current checkpoint facts into an [`Invocation`],
//! writing any job input artifact on the way. [`execute`] then runs it and
//! records the outcome before returning, success or not.

mod accession;
mod metadata_load;
mod variant_load;

pub use accession::{AccessionExecutor, ACCESSION_CONFIG_FILE};
pub use metadata_load::MetadataLoadExecutor;
pub use variant_load::{VariantLoadExecutor, LOAD_CONFIG_FILE};

use crate::config::EloadConfig;
use crate::error::{EloadError, Result};
use crate::layout::{PROJECT_LAYOUT, SUBMISSION_LAYOUT};
use crate::process::{Invocation, ProcessRunner};
use crate::resolver::MetadataStore;
use crate::stage::{Stage, StageOutcome};
use async_trait::async_trait;
use eload_checkpoint::Checkpoint;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

/// Everything a stage needs beyond the checkpoint itself
pub struct StageEnv<'a> {
    pub config: &'a EloadConfig,
    pub submission_root: &'a Path,
    pub project_dir: &'a Path,
    pub runner: &'a dyn ProcessRunner,
    pub metadata: &'a dyn MetadataStore,
}

impl StageEnv<'_> {
    pub fn project_path(&self, key: &str) -> Result<PathBuf> {
        PROJECT_LAYOUT.path_for(self.project_dir, key)
    }

    pub fn submission_path(&self, key: &str) -> Result<PathBuf> {
        SUBMISSION_LAYOUT.path_for(self.submission_root, key)
    }

    /// Log file capturing the stage's process output
    pub fn log_path(&self, stage: Stage) -> Result<PathBuf> {
        Ok(self.project_path("logs")?.join(format!("{}.log", stage)))
    }

    /// Fresh scratch directory for one pipeline run
    pub async fn work_dir(&self, stage: Stage) -> Result<PathBuf> {
        let dir = self
            .submission_path("scratch")?
            .join(format!("{}_{}", stage, Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EloadError::io(&dir, e))?;
        Ok(dir)
    }

    /// `*.vcf.gz` files currently in the project's valid folder, sorted
    pub async fn valid_vcfs(&self) -> Result<Vec<PathBuf>> {
        list_valid_vcfs(&self.project_path("valid")?).await
    }
}

pub(crate) async fn list_valid_vcfs(valid_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(valid_dir)
        .await
        .map_err(|e| EloadError::io(valid_dir, e))?;
    let mut vcfs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| EloadError::io(valid_dir, e))?
    {
        let path = entry.path();
        let is_vcf = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".vcf.gz"))
            .unwrap_or(false);
        if is_vcf && path.is_file() {
            vcfs.push(path);
        }
    }
    vcfs.sort();
    Ok(vcfs)
}

/// Builds the invocation of one stage
#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn stage(&self) -> Stage;

    /// Build the execution context from checkpoint facts and materialize it.
    /// Must not modify the checkpoint.
    async fn prepare(&self, checkpoint: &Checkpoint, env: &StageEnv<'_>) -> Result<Invocation>;
}

/// Executor for a stage
pub fn executor_for(stage: Stage) -> Box<dyn StageExecutor> {
    match stage {
        Stage::MetadataLoad => Box::new(MetadataLoadExecutor),
        Stage::Accession => Box::new(AccessionExecutor),
        Stage::VariantLoad => Box::new(VariantLoadExecutor),
    }
}

/// Prepare, run and record one stage.
///
/// The outcome is durably recorded before this returns. A non-zero exit is
/// returned as [`EloadError::StageExecution`] after `failure` is recorded.
pub async fn execute(
    executor: &dyn StageExecutor,
    checkpoint: &mut Checkpoint,
    env: &StageEnv<'_>,
) -> Result<()> {
    let stage = executor.stage();
    let invocation = executor.prepare(checkpoint, env).await?;
    info!(eload = %checkpoint.eload(), stage = %stage, "Running stage");

    let outcome = match env.runner.run(&invocation).await {
        Ok(outcome) => outcome,
        Err(e) => {
            record_outcome(checkpoint, stage, StageOutcome::Failure).await?;
            return Err(e);
        }
    };

    let recorded = StageOutcome::from_exit_success(outcome.success());
    record_outcome(checkpoint, stage, recorded).await?;

    if outcome.success() {
        info!(eload = %checkpoint.eload(), stage = %stage, "Stage succeeded");
        Ok(())
    } else {
        error!(
            eload = %checkpoint.eload(),
            stage = %stage,
            exit_code = ?outcome.exit_code,
            log = %invocation.log_path.display(),
            "Stage failed; results might not be complete"
        );
        Err(EloadError::StageExecution {
            stage: stage.to_string(),
            exit_code: outcome.exit_code,
            log_path: invocation.log_path,
        })
    }
}

async fn record_outcome(checkpoint: &mut Checkpoint, stage: Stage, outcome: StageOutcome) -> Result<()> {
    checkpoint
        .set(&stage.outcome_path(), outcome.as_str())
        .await?;
    Ok(())
}
