//! Checkpoint keys and typed views over the facts they hold
//!
//! Upstream collaborators (detection, validation, brokering) and the
//! ingestion stages agree on these key paths. The typed views deserialize a
//! sub-tree of the checkpoint document so callers do not pick values out of
//! untyped YAML by hand.

use crate::error::Result;
use eload_checkpoint::{Checkpoint, CheckpointDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BROKERED_VCF_FILES: &[&str] = &["brokering", "vcf_files"];
pub const PROJECT_ACCESSION: &[&str] = &["brokering", "ena", "PROJECT"];
pub const ANALYSIS_ACCESSION: &[&str] = &["brokering", "ena", "ANALYSIS"];

pub const SUBMITTED_VCF_FILES: &[&str] = &["submission", "vcf_files"];
pub const METADATA_SPREADSHEET: &[&str] = &["submission", "metadata_spreadsheet"];
pub const ASSEMBLY_ACCESSION: &[&str] = &["submission", "assembly_accession"];
pub const TAXONOMY_ID: &[&str] = &["submission", "taxonomy_id"];
pub const SCIENTIFIC_NAME: &[&str] = &["submission", "scientific_name"];
pub const ASSEMBLY_FASTA: &[&str] = &["submission", "assembly_fasta"];
pub const ASSEMBLY_REPORT: &[&str] = &["submission", "assembly_report"];

pub const INGESTION_DATE: &[&str] = &["ingestion", "ingestion_date"];
pub const PROJECT_DIR: &[&str] = &["ingestion", "project_dir"];
pub const AGGREGATION: &[&str] = &["ingestion", "aggregation"];
pub const DB_NAME: &[&str] = &["ingestion", "database", "db_name"];
pub const DB_EXISTS: &[&str] = &["ingestion", "database", "exists"];
pub const INSTANCE_ID: &[&str] = &["ingestion", "accession", "instance_id"];
pub const VEP_VERSION: &[&str] = &["ingestion", "variant_load", "vep", "version"];
pub const VEP_CACHE_VERSION: &[&str] = &["ingestion", "variant_load", "vep", "cache_version"];

/// One brokered VCF, keyed by its path under `brokering.vcf_files`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokeredVcf {
    /// Path of the tabix/CSI index next to the VCF
    pub index: Option<String>,
}

/// Brokered VCFs by path
pub type BrokeredVcfs = BTreeMap<String, BrokeredVcf>;

pub fn brokered_vcfs(document: &CheckpointDocument) -> Result<BrokeredVcfs> {
    Ok(document
        .query_as::<BrokeredVcfs>(BROKERED_VCF_FILES)?
        .unwrap_or_default())
}

/// Assembly and organism facts recorded during detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFacts {
    pub assembly_accession: Option<String>,
    pub taxonomy_id: Option<u32>,
    pub scientific_name: Option<String>,
    pub assembly_fasta: Option<String>,
    pub assembly_report: Option<String>,
}

pub fn submission_facts(document: &CheckpointDocument) -> Result<SubmissionFacts> {
    Ok(document
        .query_as::<SubmissionFacts>(&["submission"])?
        .unwrap_or_default())
}

/// Variant store database facts recorded by ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseFacts {
    pub db_name: Option<String>,
    pub exists: Option<bool>,
}

pub fn database_facts(document: &CheckpointDocument) -> Result<DatabaseFacts> {
    Ok(document
        .query_as::<DatabaseFacts>(&["ingestion", "database"])?
        .unwrap_or_default())
}

/// Required string fact, as an owned value
pub fn required_str(checkpoint: &Checkpoint, path: &[&str]) -> Result<String> {
    checkpoint
        .query_str(path)
        .map(str::to_string)
        .ok_or_else(|| {
            crate::error::EloadError::precondition(format!(
                "{} is not recorded in {}",
                eload_checkpoint::display_path(path),
                checkpoint.location()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brokered_vcfs_with_dotted_paths() {
        let doc = CheckpointDocument::from_yaml_str(
            r#"
brokering:
  vcf_files:
    /data/ELOAD_5/a.vcf.gz:
      index: /data/ELOAD_5/a.vcf.gz.csi
"#,
        )
        .unwrap();

        let vcfs = brokered_vcfs(&doc).unwrap();
        assert_eq!(
            vcfs["/data/ELOAD_5/a.vcf.gz"].index.as_deref(),
            Some("/data/ELOAD_5/a.vcf.gz.csi")
        );
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let doc = CheckpointDocument::new();
        assert!(brokered_vcfs(&doc).unwrap().is_empty());
        assert_eq!(submission_facts(&doc).unwrap(), SubmissionFacts::default());
        assert_eq!(database_facts(&doc).unwrap(), DatabaseFacts::default());
    }

    #[test]
    fn test_submission_facts_ignore_unknown_keys() {
        let doc = CheckpointDocument::from_yaml_str(
            "submission:\n  assembly_accession: GCA_000001405.15\n  taxonomy_id: 9606\n  vcf_files: [a.vcf]\n",
        )
        .unwrap();

        let facts = submission_facts(&doc).unwrap();
        assert_eq!(facts.assembly_accession.as_deref(), Some("GCA_000001405.15"));
        assert_eq!(facts.taxonomy_id, Some(9606));
    }
}
