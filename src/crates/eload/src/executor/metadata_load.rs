//! Metadata load: pulls the project's ENA metadata into the metadata store

use super::{StageEnv, StageExecutor};
use crate::error::Result;
use crate::facts;
use crate::process::Invocation;
use crate::stage::Stage;
use async_trait::async_trait;
use eload_checkpoint::Checkpoint;

pub struct MetadataLoadExecutor;

#[async_trait]
impl StageExecutor for MetadataLoadExecutor {
    fn stage(&self) -> Stage {
        Stage::MetadataLoad
    }

    async fn prepare(&self, checkpoint: &Checkpoint, env: &StageEnv<'_>) -> Result<Invocation> {
        let project = facts::required_str(checkpoint, facts::PROJECT_ACCESSION)?;
        let perl = env.config.executable("perl")?;
        let script = env.config.executable("load_from_ena")?;
        let scratch = env.submission_path("scratch")?;

        Ok(Invocation::new("Load metadata from ENA", perl, env.log_path(self.stage())?)
            .arg(script)
            .args(["-p", project.as_str()])
            .args(["-c", "submitted", "-v", "1"])
            .arg("-l")
            .arg(scratch)
            .args(["-e".to_string(), checkpoint.eload().number().to_string()]))
    }
}
