//! Stage gate
//!
//! Decides from checkpoint facts alone whether the requested stages may run.
//! Every requested stage is checked before anything executes, so a run either
//! starts with a fully legal plan or fails without side effects.

use crate::error::{EloadError, Result};
use crate::facts;
use crate::stage::{IngestionRequest, Stage, StageOutcome};
use eload_checkpoint::{display_path, CheckpointDocument};
use tracing::debug;

/// A prerequisite a stage found unsatisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub stage: Stage,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}

/// Check the request against the document and return the stages to run, in order
pub fn evaluate(document: &CheckpointDocument, request: &IngestionRequest) -> Result<Vec<Stage>> {
    let plan = request.ordered_stages();
    reject(violations(document, request, &plan))?;
    debug!(stages = ?plan, "Stage gate passed");
    Ok(plan)
}

/// Every rule except the variant store database identity; checked before any
/// store is consulted for the database
pub fn evaluate_recorded_facts(document: &CheckpointDocument, request: &IngestionRequest) -> Result<()> {
    let plan = request.ordered_stages();
    reject(collect(document, request, &plan, false))
}

fn reject(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        return Ok(());
    }

    let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
    Err(EloadError::precondition(format!(
        "cannot start ingestion; {}",
        details.join("; ")
    )))
}

/// Every unsatisfied prerequisite of every planned stage
pub fn violations(
    document: &CheckpointDocument,
    request: &IngestionRequest,
    plan: &[Stage],
) -> Vec<Violation> {
    collect(document, request, plan, true)
}

fn collect(
    document: &CheckpointDocument,
    request: &IngestionRequest,
    plan: &[Stage],
    check_database: bool,
) -> Vec<Violation> {
    let mut found = Vec::new();
    for stage in plan {
        let mut missing = |reason: String| {
            found.push(Violation {
                stage: *stage,
                reason,
            })
        };

        for path in [facts::BROKERED_VCF_FILES, facts::PROJECT_ACCESSION] {
            if !document.is_truthy(path) {
                missing(missing_fact(path));
            }
        }

        if !stage.needs_database() {
            continue;
        }

        for path in [facts::ASSEMBLY_ACCESSION, facts::TAXONOMY_ID] {
            if !document.is_truthy(path) {
                missing(missing_fact(path));
            }
        }
        if check_database {
            match document.get_str(facts::DB_NAME) {
                None => missing(missing_fact(facts::DB_NAME)),
                Some(name) => {
                    if !document.is_truthy(facts::DB_EXISTS) {
                        missing(format!("variant store database '{}' does not exist", name));
                    }
                }
            }
        }
        if request.aggregation.is_none() {
            missing("no aggregation mode given".to_string());
        }

        match stage {
            Stage::Accession => {
                if request.instance_id.is_none() {
                    missing("no accessioning instance id given".to_string());
                }
                for path in [facts::ASSEMBLY_FASTA, facts::ASSEMBLY_REPORT] {
                    if !document.is_truthy(path) {
                        missing(missing_fact(path));
                    }
                }
            }
            Stage::VariantLoad => {
                for path in [
                    facts::ANALYSIS_ACCESSION,
                    facts::SCIENTIFIC_NAME,
                    facts::ASSEMBLY_FASTA,
                ] {
                    if !document.is_truthy(path) {
                        missing(missing_fact(path));
                    }
                }
                let accessioned = document.get_str(&Stage::Accession.outcome_path())
                    == Some(StageOutcome::Success.as_str());
                let accessioning_first = plan.contains(&Stage::Accession);
                if !accessioned && !accessioning_first {
                    missing("accession has not completed successfully".to_string());
                }
            }
            Stage::MetadataLoad => {}
        }
    }
    found
}

fn missing_fact(path: &[&str]) -> String {
    format!("{} is missing", display_path(path))
}
