//! Status command handler

use super::CliContext;
use crate::error::{EloadError, Result};
use crate::submission::{Eload, StatusReport};
use colored::Colorize;
use eload_checkpoint::EloadId;

/// Handle the status command
pub async fn handle_status(context: &CliContext, eload: EloadId, format: &str) -> Result<()> {
    let submission = Eload::open(&context.config.paths, context.backend.clone(), eload).await?;
    let report = submission.status()?;

    match format {
        "json" => {
            println!("{}", render_json(&report)?);
        }
        "text" => print_text(&report),
        other => {
            return Err(EloadError::configuration(format!(
                "Unknown format '{}' (expected text or json)",
                other
            )))
        }
    }
    Ok(())
}

fn render_json(report: &StatusReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn print_text(report: &StatusReport) {
    println!("{}", report.eload.bold());
    println!("  Checkpoint: {}", report.checkpoint);
    println!("  Project: {}", report.project_accession.as_deref().unwrap_or("-"));
    println!("  Project directory: {}", report.project_dir.as_deref().unwrap_or("-"));
    let database = match (&report.db_name, report.db_exists) {
        (Some(name), Some(true)) => name.green().to_string(),
        (Some(name), _) => format!("{} (not found)", name).red().to_string(),
        (None, _) => "-".to_string(),
    };
    println!("  Database: {}", database);
    println!();
    println!("{:<16} {}", "Stage", "Outcome");
    println!("{}", "-".repeat(28));
    for (stage, outcome) in &report.stages {
        let outcome = match outcome.as_deref() {
            Some("success") => "success".green(),
            Some("failure") => "failure".red(),
            Some(other) => other.yellow(),
            None => "not run".dimmed(),
        };
        println!("{:<16} {}", stage.as_str(), outcome);
    }
}
