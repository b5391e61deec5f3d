//! Job input artifacts for the Nextflow pipelines
//!
//! Field names and nesting are what the pipelines parse; the flat dotted keys
//! of the job properties are Spring Batch property names.

use crate::error::{EloadError, Result};
use crate::stage::{Aggregation, VepVersions};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Spring Batch properties of the accessioning job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessionJobProps {
    #[serde(rename = "spring.batch.job.names")]
    pub job_names: String,
    #[serde(rename = "parameters.assemblyAccession")]
    pub assembly_accession: String,
    #[serde(rename = "parameters.taxonomyAccession")]
    pub taxonomy_id: u32,
    #[serde(rename = "parameters.projectAccession")]
    pub project_accession: String,
    #[serde(rename = "parameters.chunkSize")]
    pub chunk_size: u32,
    #[serde(rename = "parameters.vcfAggregation")]
    pub vcf_aggregation: String,
    #[serde(rename = "parameters.forceRestart")]
    pub force_restart: bool,
    #[serde(rename = "parameters.contigNaming")]
    pub contig_naming: String,
    #[serde(rename = "parameters.fasta")]
    pub fasta: String,
    #[serde(rename = "parameters.assemblyReportUrl")]
    pub assembly_report_url: String,
    #[serde(rename = "accessioning.instanceId")]
    pub instance_id: String,
    #[serde(rename = "accessioning.submitted.categoryId")]
    pub category_id: String,
    #[serde(rename = "accessioning.monotonic.ss.blockSize")]
    pub block_size: u64,
    #[serde(rename = "accessioning.monotonic.ss.blockStartValue")]
    pub block_start_value: u64,
    #[serde(rename = "accessioning.monotonic.ss.nextBlockInterval")]
    pub next_block_interval: u64,
    #[serde(rename = "spring.data.mongodb.host")]
    pub mongo_host: String,
    #[serde(rename = "spring.data.mongodb.port")]
    pub mongo_port: u16,
    #[serde(rename = "spring.data.mongodb.database")]
    pub mongo_database: String,
    #[serde(rename = "spring.data.mongodb.username", skip_serializing_if = "Option::is_none")]
    pub mongo_user: Option<String>,
    #[serde(rename = "spring.data.mongodb.password", skip_serializing_if = "Option::is_none")]
    pub mongo_password: Option<String>,
    #[serde(rename = "spring.data.mongodb.authentication-database")]
    pub mongo_auth_database: String,
    #[serde(rename = "mongodb.read-preference")]
    pub read_preference: String,
    #[serde(rename = "spring.datasource.driver-class-name")]
    pub datasource_driver: String,
    #[serde(rename = "spring.datasource.url")]
    pub datasource_url: String,
    #[serde(rename = "spring.datasource.username")]
    pub datasource_user: String,
    #[serde(rename = "spring.datasource.password")]
    pub datasource_password: String,
    #[serde(rename = "spring.datasource.tomcat.max-active")]
    pub datasource_max_active: u32,
    #[serde(rename = "spring.jpa.generate-ddl")]
    pub jpa_generate_ddl: bool,
    #[serde(rename = "spring.main.web-application-type")]
    pub web_application_type: String,
    #[serde(rename = "spring.main.allow-bean-definition-overriding")]
    pub allow_bean_definition_overriding: bool,
    #[serde(rename = "eva.count-stats.url", skip_serializing_if = "Option::is_none")]
    pub count_stats_url: Option<String>,
}

/// Inputs to [`AccessionJobProps::new`]
#[derive(Debug, Clone)]
pub struct AccessionJobInputs<'a> {
    pub assembly_accession: &'a str,
    pub taxonomy_id: u32,
    pub project_accession: &'a str,
    pub aggregation: Aggregation,
    pub fasta: &'a str,
    pub report: &'a str,
    pub instance_id: u32,
}

/// Connection settings the pipelines receive verbatim
#[derive(Debug, Clone)]
pub struct StoreCredentials<'a> {
    pub mongo_host: &'a str,
    pub mongo_port: u16,
    pub mongo_user: Option<&'a str>,
    pub mongo_password: Option<&'a str>,
    pub mongo_auth_database: &'a str,
    pub accession_database: &'a str,
    pub jdbc_url: &'a str,
    pub jdbc_user: &'a str,
    pub jdbc_password: &'a str,
    pub count_stats_url: Option<&'a str>,
}

impl AccessionJobProps {
    pub fn new(inputs: &AccessionJobInputs<'_>, creds: &StoreCredentials<'_>) -> Self {
        Self {
            job_names: "CREATE_SUBSNP_ACCESSION_JOB".to_string(),
            assembly_accession: inputs.assembly_accession.to_string(),
            taxonomy_id: inputs.taxonomy_id,
            project_accession: inputs.project_accession.to_string(),
            chunk_size: 100,
            vcf_aggregation: inputs.aggregation.pipeline_value().to_string(),
            force_restart: true,
            contig_naming: "NO_REPLACEMENT".to_string(),
            fasta: inputs.fasta.to_string(),
            assembly_report_url: format!("file:{}", inputs.report),
            instance_id: format!("instance-{}", inputs.instance_id),
            category_id: "ss".to_string(),
            block_size: 100_000,
            block_start_value: 5_000_000_000,
            next_block_interval: 1_000_000_000,
            mongo_host: creds.mongo_host.to_string(),
            mongo_port: creds.mongo_port,
            mongo_database: creds.accession_database.to_string(),
            mongo_user: creds.mongo_user.map(str::to_string),
            mongo_password: creds.mongo_password.map(str::to_string),
            mongo_auth_database: creds.mongo_auth_database.to_string(),
            read_preference: "primary".to_string(),
            datasource_driver: "org.postgresql.Driver".to_string(),
            datasource_url: creds.jdbc_url.to_string(),
            datasource_user: creds.jdbc_user.to_string(),
            datasource_password: creds.jdbc_password.to_string(),
            datasource_max_active: 3,
            jpa_generate_ddl: true,
            web_application_type: "none".to_string(),
            allow_bean_definition_overriding: true,
            count_stats_url: creds.count_stats_url.map(str::to_string),
        }
    }
}

/// Spring Batch properties of the variant load job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantLoadJobProps {
    #[serde(rename = "spring.batch.job.names")]
    pub job_names: String,
    #[serde(rename = "input.vcf.aggregation")]
    pub aggregation: String,
    #[serde(rename = "input.vcf.id")]
    pub analysis_accession: String,
    #[serde(rename = "input.study.id")]
    pub project_accession: String,
    #[serde(rename = "input.study.name")]
    pub study_name: String,
    #[serde(rename = "input.study.type")]
    pub study_type: String,
    #[serde(rename = "input.fasta")]
    pub fasta: String,
    #[serde(rename = "output.dir")]
    pub output_dir: PathBuf,
    #[serde(rename = "output.dir.annotation")]
    pub annotation_dir: PathBuf,
    #[serde(rename = "output.dir.statistics")]
    pub stats_dir: PathBuf,
    #[serde(rename = "spring.data.mongodb.database")]
    pub db_name: String,
    #[serde(rename = "db.collections.files.name")]
    pub files_collection: String,
    #[serde(rename = "db.collections.variants.name")]
    pub variants_collection: String,
    #[serde(rename = "db.collections.annotation-metadata.name")]
    pub annotation_metadata_collection: String,
    #[serde(rename = "db.collections.annotations.name")]
    pub annotations_collection: String,
    #[serde(rename = "app.vep.cache.path", skip_serializing_if = "Option::is_none")]
    pub vep_cache_path: Option<PathBuf>,
    #[serde(rename = "app.vep.cache.species")]
    pub vep_species: String,
    #[serde(rename = "app.vep.version", skip_serializing_if = "Option::is_none")]
    pub vep_version: Option<u32>,
    #[serde(rename = "app.vep.cache.version", skip_serializing_if = "Option::is_none")]
    pub vep_cache_version: Option<u32>,
    #[serde(rename = "app.vep.num-forks")]
    pub vep_num_forks: u32,
    #[serde(rename = "app.vep.timeout")]
    pub vep_timeout: u32,
    #[serde(rename = "statistics.skip")]
    pub statistics_skip: bool,
    #[serde(rename = "annotation.skip")]
    pub annotation_skip: bool,
    #[serde(rename = "config.restartability.allow")]
    pub allow_restart: bool,
    #[serde(rename = "config.db.read-preference")]
    pub read_preference: String,
}

/// Inputs to [`VariantLoadJobProps::new`]
#[derive(Debug, Clone)]
pub struct VariantLoadJobInputs<'a> {
    pub project_accession: &'a str,
    pub analysis_accession: &'a str,
    pub aggregation: Aggregation,
    pub study_name: &'a str,
    pub fasta: &'a str,
    pub output_dir: &'a Path,
    pub annotation_dir: &'a Path,
    pub stats_dir: &'a Path,
    pub db_name: &'a str,
    pub vep_species: &'a str,
    pub vep: Option<VepVersions>,
    pub vep_cache_path: Option<&'a Path>,
}

impl VariantLoadJobProps {
    pub fn new(inputs: &VariantLoadJobInputs<'_>) -> Self {
        let job_names = match inputs.aggregation {
            Aggregation::None => "genotyped-vcf-job",
            Aggregation::Basic => "aggregated-vcf-job",
        };
        Self {
            job_names: job_names.to_string(),
            aggregation: inputs.aggregation.pipeline_value().to_string(),
            analysis_accession: inputs.analysis_accession.to_string(),
            project_accession: inputs.project_accession.to_string(),
            study_name: inputs.study_name.to_string(),
            study_type: "COLLECTION".to_string(),
            fasta: inputs.fasta.to_string(),
            output_dir: inputs.output_dir.to_path_buf(),
            annotation_dir: inputs.annotation_dir.to_path_buf(),
            stats_dir: inputs.stats_dir.to_path_buf(),
            db_name: inputs.db_name.to_string(),
            files_collection: "files_2_0".to_string(),
            variants_collection: "variants_2_0".to_string(),
            annotation_metadata_collection: "annotationMetadata_2_0".to_string(),
            annotations_collection: "annotations_2_0".to_string(),
            vep_cache_path: inputs.vep_cache_path.map(Path::to_path_buf),
            vep_species: inputs.vep_species.to_string(),
            vep_version: inputs.vep.map(|v| v.version),
            vep_cache_version: inputs.vep.map(|v| v.cache_version),
            vep_num_forks: 4,
            vep_timeout: 500,
            statistics_skip: false,
            annotation_skip: inputs.vep.is_none(),
            allow_restart: false,
            read_preference: "secondaryPreferred".to_string(),
        }
    }
}

/// VEP species name: lower case, words joined by underscores
pub fn vep_species(scientific_name: &str) -> String {
    scientific_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// `accession_config_file.yaml`
#[derive(Debug, Clone, Serialize)]
pub struct AccessionConfig {
    pub valid_vcfs: Vec<PathBuf>,
    pub project_accession: String,
    pub instance_id: u32,
    pub accession_job_props: AccessionJobProps,
    pub public_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub executable: BTreeMap<String, String>,
    pub jar: BTreeMap<String, String>,
}

/// `load_config_file.yaml`
#[derive(Debug, Clone, Serialize)]
pub struct LoadConfig {
    pub valid_vcfs: Vec<PathBuf>,
    pub needs_merge: bool,
    pub load_job_props: VariantLoadJobProps,
    pub project_accession: String,
    pub logs_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eva_pipeline_props: Option<PathBuf>,
    pub executable: BTreeMap<String, String>,
    pub jar: BTreeMap<String, String>,
}

/// Serialize an artifact as YAML at `path`, replacing any previous version
pub async fn write_artifact<T: Serialize>(path: &Path, artifact: &T) -> Result<()> {
    let text = serde_yaml::to_string(artifact)?;
    tokio::fs::write(path, text)
        .await
        .map_err(|e| EloadError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn creds() -> StoreCredentials<'static> {
        StoreCredentials {
            mongo_host: "mongo.example.org",
            mongo_port: 27017,
            mongo_user: Some("eva"),
            mongo_password: Some("mongo-pass"),
            mongo_auth_database: "admin",
            accession_database: "eva_accession_sharded",
            jdbc_url: "jdbc:postgresql://pg:5432/evapro",
            jdbc_user: "evapro",
            jdbc_password: "pg-pass",
            count_stats_url: None,
        }
    }

    #[test]
    fn test_accession_props_keys() {
        let props = AccessionJobProps::new(
            &AccessionJobInputs {
                assembly_accession: "GCA_000001405.15",
                taxonomy_id: 9606,
                project_accession: "PRJEB1000",
                aggregation: Aggregation::None,
                fasta: "/refs/genome.fa",
                report: "/refs/report.txt",
                instance_id: 7,
            },
            &creds(),
        );
        let value = serde_yaml::to_value(&props).unwrap();

        assert_eq!(value["parameters.assemblyAccession"], Value::from("GCA_000001405.15"));
        assert_eq!(value["parameters.taxonomyAccession"], Value::from(9606));
        assert_eq!(value["parameters.assemblyReportUrl"], Value::from("file:/refs/report.txt"));
        assert_eq!(value["accessioning.instanceId"], Value::from("instance-7"));
        assert_eq!(value["spring.data.mongodb.database"], Value::from("eva_accession_sharded"));
        assert_eq!(value["spring.datasource.url"], Value::from("jdbc:postgresql://pg:5432/evapro"));
        assert!(value.get("eva.count-stats.url").is_none());
    }

    fn load_inputs(vep: Option<VepVersions>) -> VariantLoadJobProps {
        VariantLoadJobProps::new(&VariantLoadJobInputs {
            project_accession: "PRJEB1000",
            analysis_accession: "ERZ2000",
            aggregation: Aggregation::Basic,
            study_name: "A study",
            fasta: "/refs/genome.fa",
            output_dir: Path::new("/p/40_transformed"),
            annotation_dir: Path::new("/p/51_annotation"),
            stats_dir: Path::new("/p/50_stats"),
            db_name: "eva_hsapiens_grch38",
            vep_species: "homo_sapiens",
            vep,
            vep_cache_path: Some(Path::new("/vep")),
        })
    }

    #[test]
    fn test_variant_load_props_with_vep() {
        let props = load_inputs(Some(VepVersions {
            version: 104,
            cache_version: 104,
        }));
        let value = serde_yaml::to_value(&props).unwrap();

        assert_eq!(value["spring.batch.job.names"], Value::from("aggregated-vcf-job"));
        assert_eq!(value["input.vcf.aggregation"], Value::from("BASIC"));
        assert_eq!(value["spring.data.mongodb.database"], Value::from("eva_hsapiens_grch38"));
        assert_eq!(value["output.dir.statistics"], Value::from("/p/50_stats"));
        assert_eq!(value["app.vep.version"], Value::from(104));
        assert_eq!(value["annotation.skip"], Value::from(false));
    }

    #[test]
    fn test_variant_load_without_vep_skips_annotation() {
        let value = serde_yaml::to_value(load_inputs(None)).unwrap();
        assert_eq!(value["annotation.skip"], Value::from(true));
        assert!(value.get("app.vep.version").is_none());
    }

    #[test]
    fn test_vep_species() {
        assert_eq!(vep_species("Homo sapiens"), "homo_sapiens");
        assert_eq!(vep_species("  Bos   taurus "), "bos_taurus");
    }

    #[tokio::test]
    async fn test_write_artifact_overwrites() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("artifact.yaml");

        write_artifact(&path, &BTreeMap::from([("a", 1)])).await.unwrap();
        write_artifact(&path, &BTreeMap::from([("b", 2)])).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("a:"));
        assert!(text.contains("b: 2"));
    }
}
