//! Ingest command handler

use super::CliContext;
use crate::error::Result;
use crate::ingestion::EloadIngestion;
use crate::process::SystemProcessRunner;
use crate::stage::IngestionRequest;
use colored::Colorize;
use eload_checkpoint::EloadId;
use std::sync::Arc;

/// Handle the ingest command
pub async fn handle_ingest(context: &CliContext, eload: EloadId, request: IngestionRequest) -> Result<()> {
    let ingestion = EloadIngestion::new(
        context.config.clone(),
        context.backend.clone(),
        context.resolver()?,
        Arc::new(SystemProcessRunner::new()),
    );

    let report = ingestion.ingest(eload, &request).await?;

    println!("{}", format!("✓ Ingestion of {} complete", report.eload).green().bold());
    println!("  Project directory: {}", report.project_dir.display());
    for stage in &report.stages {
        println!("  {:<14} {}", stage.as_str(), "success".green());
    }
    Ok(())
}
