//! Variant load: loads, annotates and summarises the valid VCFs

use super::accession::{recorded_aggregation, required_u32};
use super::{StageEnv, StageExecutor};
use crate::error::{EloadError, Result};
use crate::facts;
use crate::process::Invocation;
use crate::stage::{Aggregation, Stage, VepVersions};
use crate::templates::{vep_species, write_artifact, LoadConfig, VariantLoadJobInputs, VariantLoadJobProps};
use async_trait::async_trait;
use eload_checkpoint::Checkpoint;
use tracing::debug;

pub const LOAD_CONFIG_FILE: &str = "load_config_file.yaml";

pub struct VariantLoadExecutor;

impl VariantLoadExecutor {
    async fn study_name(&self, project_accession: &str, env: &StageEnv<'_>) -> Result<String> {
        let mut titles = env.metadata.study_titles(project_accession).await?;
        match titles.len() {
            1 => Ok(titles.remove(0)),
            0 => Err(EloadError::precondition(format!(
                "project {} not found in the metadata store",
                project_accession
            ))),
            n => Err(EloadError::precondition(format!(
                "{} projects with accession {} found in the metadata store",
                n, project_accession
            ))),
        }
    }
}

fn recorded_vep(checkpoint: &Checkpoint) -> Result<Option<VepVersions>> {
    if !checkpoint.document().contains(facts::VEP_VERSION) {
        return Ok(None);
    }
    Ok(Some(VepVersions {
        version: required_u32(checkpoint, facts::VEP_VERSION)?,
        cache_version: required_u32(checkpoint, facts::VEP_CACHE_VERSION)?,
    }))
}

#[async_trait]
impl StageExecutor for VariantLoadExecutor {
    fn stage(&self) -> Stage {
        Stage::VariantLoad
    }

    async fn prepare(&self, checkpoint: &Checkpoint, env: &StageEnv<'_>) -> Result<Invocation> {
        let project_accession = facts::required_str(checkpoint, facts::PROJECT_ACCESSION)?;
        let analysis_accession = facts::required_str(checkpoint, facts::ANALYSIS_ACCESSION)?;
        let fasta = facts::required_str(checkpoint, facts::ASSEMBLY_FASTA)?;
        let scientific_name = facts::required_str(checkpoint, facts::SCIENTIFIC_NAME)?;
        let db_name = facts::required_str(checkpoint, facts::DB_NAME)?;
        let aggregation = recorded_aggregation(checkpoint)?;
        let vep = recorded_vep(checkpoint)?;
        let study_name = self.study_name(&project_accession, env).await?;

        let output_dir = env.project_path("transformed")?;
        let annotation_dir = env.project_path("annotation")?;
        let stats_dir = env.project_path("stats")?;
        let species = vep_species(&scientific_name);
        let job_props = VariantLoadJobProps::new(&VariantLoadJobInputs {
            project_accession: &project_accession,
            analysis_accession: &analysis_accession,
            aggregation,
            study_name: &study_name,
            fasta: &fasta,
            output_dir: &output_dir,
            annotation_dir: &annotation_dir,
            stats_dir: &stats_dir,
            db_name: &db_name,
            vep_species: &species,
            vep,
            vep_cache_path: env.config.pipeline.vep_cache_path.as_deref(),
        });

        let logs_dir = env.project_path("logs")?;
        let artifact = LoadConfig {
            valid_vcfs: env.valid_vcfs().await?,
            // TODO: take the merge decision from validation once it records one
            needs_merge: aggregation == Aggregation::None,
            load_job_props: job_props,
            project_accession,
            logs_dir: logs_dir.clone(),
            eva_pipeline_props: env.config.pipeline.eva_pipeline_props.clone(),
            executable: env.config.executables.clone(),
            jar: env.config.jars.clone(),
        };
        let artifact_path = logs_dir.join(LOAD_CONFIG_FILE);
        write_artifact(&artifact_path, &artifact).await?;
        debug!(path = %artifact_path.display(), vcfs = artifact.valid_vcfs.len(), "Wrote load config");

        let nextflow = env.config.executable("nextflow")?;
        let work_dir = env.work_dir(self.stage()).await?;
        Ok(
            Invocation::new("Nextflow variant load", nextflow, env.log_path(self.stage())?)
                .arg(&env.config.nextflow.variant_load_script)
                .arg("-params-file")
                .arg(artifact_path)
                .arg("-work-dir")
                .arg(&work_dir)
                .env("NXF_OPTS", env.config.nextflow.java_opts.as_str())
                .current_dir(env.project_dir),
        )
    }
}
