//! Add-ext-reference command handler

use super::CliContext;
use crate::error::Result;
use crate::ext_reference::{EnaBrowserClient, ExtReferenceLinker, IdentifiersOrgResolver};
use colored::Colorize;
use std::sync::Arc;

/// Handle the add-ext-reference command
pub async fn handle_add(
    context: &CliContext,
    project_accession: &str,
    source_database: &str,
    identifier: &str,
) -> Result<()> {
    let linker = ExtReferenceLinker::new(
        context.metadata_store()?,
        Arc::new(EnaBrowserClient::new(&context.config.resolver)),
        Arc::new(IdentifiersOrgResolver::new(&context.config.resolver)),
    );

    let outcome = linker.add(project_accession, source_database, identifier).await?;

    let curie = format!("{}:{}", source_database, identifier);
    if outcome.created_reference || outcome.linked_project {
        println!("{}", format!("✓ {} linked to {}", curie, project_accession).green().bold());
    } else {
        println!("{}", format!("{} was already linked to {}", curie, project_accession).yellow());
    }
    println!("  dbxref_id: {}", outcome.dbxref_id);
    println!("  {}", "Upload the reference to ENA manually".yellow());
    Ok(())
}
