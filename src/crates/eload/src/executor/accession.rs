//! Accessioning: runs the accession workflow over the valid VCFs

use super::{StageEnv, StageExecutor};
use crate::error::{EloadError, Result};
use crate::facts;
use crate::process::Invocation;
use crate::stage::{Aggregation, Stage};
use crate::templates::{
    write_artifact, AccessionConfig, AccessionJobInputs, AccessionJobProps, StoreCredentials,
};
use async_trait::async_trait;
use eload_checkpoint::{display_path, Checkpoint};
use tracing::debug;

pub const ACCESSION_CONFIG_FILE: &str = "accession_config_file.yaml";

pub struct AccessionExecutor;

pub(crate) fn store_credentials<'a>(env: &'a StageEnv<'_>) -> StoreCredentials<'a> {
    let variants = &env.config.variant_store;
    let metadata = &env.config.metadata_store;
    StoreCredentials {
        mongo_host: &variants.host,
        mongo_port: variants.port,
        mongo_user: variants.user.as_deref(),
        mongo_password: variants.password.as_deref(),
        mongo_auth_database: &variants.authentication_database,
        accession_database: &variants.accession_database,
        jdbc_url: &metadata.jdbc_url,
        jdbc_user: &metadata.user,
        jdbc_password: &metadata.password,
        count_stats_url: env.config.pipeline.count_stats_url.as_deref(),
    }
}

pub(crate) fn recorded_aggregation(checkpoint: &Checkpoint) -> Result<Aggregation> {
    facts::required_str(checkpoint, facts::AGGREGATION)?.parse()
}

pub(crate) fn required_u32(checkpoint: &Checkpoint, path: &[&str]) -> Result<u32> {
    checkpoint.query_as::<u32>(path)?.ok_or_else(|| {
        EloadError::precondition(format!(
            "{} is not recorded in {}",
            display_path(path),
            checkpoint.location()
        ))
    })
}

#[async_trait]
impl StageExecutor for AccessionExecutor {
    fn stage(&self) -> Stage {
        Stage::Accession
    }

    async fn prepare(&self, checkpoint: &Checkpoint, env: &StageEnv<'_>) -> Result<Invocation> {
        let project_accession = facts::required_str(checkpoint, facts::PROJECT_ACCESSION)?;
        let assembly_accession = facts::required_str(checkpoint, facts::ASSEMBLY_ACCESSION)?;
        let fasta = facts::required_str(checkpoint, facts::ASSEMBLY_FASTA)?;
        let report = facts::required_str(checkpoint, facts::ASSEMBLY_REPORT)?;
        let taxonomy_id = required_u32(checkpoint, facts::TAXONOMY_ID)?;
        let instance_id = required_u32(checkpoint, facts::INSTANCE_ID)?;
        let aggregation = recorded_aggregation(checkpoint)?;

        let job_props = AccessionJobProps::new(
            &AccessionJobInputs {
                assembly_accession: &assembly_accession,
                taxonomy_id,
                project_accession: &project_accession,
                aggregation,
                fasta: &fasta,
                report: &report,
                instance_id,
            },
            &store_credentials(env),
        );

        let logs_dir = env.project_path("logs")?;
        let artifact = AccessionConfig {
            valid_vcfs: env.valid_vcfs().await?,
            project_accession,
            instance_id,
            accession_job_props: job_props,
            public_dir: env.project_path("public")?,
            logs_dir: logs_dir.clone(),
            executable: env.config.executables.clone(),
            jar: env.config.jars.clone(),
        };
        let artifact_path = logs_dir.join(ACCESSION_CONFIG_FILE);
        write_artifact(&artifact_path, &artifact).await?;
        debug!(path = %artifact_path.display(), vcfs = artifact.valid_vcfs.len(), "Wrote accession config");

        let nextflow = env.config.executable("nextflow")?;
        let work_dir = env.work_dir(self.stage()).await?;
        Ok(
            Invocation::new("Nextflow accessioning", nextflow, env.log_path(self.stage())?)
                .arg(&env.config.nextflow.accession_script)
                .arg("-params-file")
                .arg(artifact_path)
                .arg("-work-dir")
                .arg(&work_dir)
                .env("NXF_OPTS", env.config.nextflow.java_opts.as_str())
                .current_dir(env.project_dir),
        )
    }
}
