//! Detect command handler

use super::CliContext;
use crate::error::Result;
use crate::submission::{DetectRequest, Eload};
use colored::Colorize;
use eload_checkpoint::EloadId;

/// Handle the detect command
pub async fn handle_detect(context: &CliContext, eload: EloadId, request: DetectRequest) -> Result<()> {
    let mut submission = Eload::open(&context.config.paths, context.backend.clone(), eload).await?;
    let report = submission.detect(&request).await?;

    println!("{}", format!("✓ Detection recorded for {}", eload).green().bold());
    println!("  Spreadsheet: {}", report.metadata_spreadsheet.display());
    println!("  VCF files:");
    for vcf in &report.vcf_files {
        println!("    {}", vcf.display());
    }
    match &report.assembly_accession {
        Some(assembly) => println!("  Assembly: {}", assembly),
        None => println!("  Assembly: {}", "not given".yellow()),
    }
    Ok(())
}
