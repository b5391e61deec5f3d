//! Common test utilities and setup

#![allow(dead_code)]

use eload::config::EloadConfig;
use eload::facts;
use eload::testing::{InMemoryMetadataStore, InMemoryVariantStore, RecordingProcessRunner};
use eload::{EloadIngestion, ResourceResolver, PROJECT_LAYOUT};
use eload_checkpoint::{Checkpoint, CheckpointBackend, EloadId, YamlFileBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const PROJECT: &str = "PRJEB1234";
pub const ANALYSIS: &str = "ERZ5678";
pub const ASSEMBLY: &str = "GCA_000001405.15";
pub const TAXONOMY: u32 = 9606;
pub const DB_NAME: &str = "eva_hsapiens_grch38";

/// Temporary eloads/projects roots with in-memory stores and a recording runner
pub struct TestEnv {
    pub temp: TempDir,
    pub config: Arc<EloadConfig>,
    pub backend: Arc<dyn CheckpointBackend>,
    pub metadata: InMemoryMetadataStore,
    pub variants: InMemoryVariantStore,
    pub runner: RecordingProcessRunner,
}

impl TestEnv {
    /// Environment backed by checkpoint files under the temporary eloads root
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let backend = Arc::new(YamlFileBackend::new(temp.path().join("eloads")));
        Self::with_backend(temp, backend)
    }

    pub fn with_backend(temp: TempDir, backend: Arc<dyn CheckpointBackend>) -> Self {
        let mut config = EloadConfig::default();
        config.paths.eloads_dir = temp.path().join("eloads");
        config.paths.projects_dir = temp.path().join("projects");
        config
            .executables
            .insert("load_from_ena".to_string(), "/opt/eva/load_from_ena.pl".to_string());

        Self {
            temp,
            config: Arc::new(config),
            backend,
            metadata: InMemoryMetadataStore::new(),
            variants: InMemoryVariantStore::new(),
            runner: RecordingProcessRunner::new(),
        }
    }

    pub fn ingestion(&self) -> EloadIngestion {
        EloadIngestion::new(
            self.config.clone(),
            self.backend.clone(),
            ResourceResolver::new(Arc::new(self.metadata.clone()), Arc::new(self.variants.clone())),
            Arc::new(self.runner.clone()),
        )
    }

    pub async fn checkpoint(&self, eload: EloadId) -> Checkpoint {
        Checkpoint::open(self.backend.clone(), eload)
            .await
            .expect("Failed to open checkpoint")
    }

    pub fn project_dir(&self) -> PathBuf {
        self.config.paths.projects_dir.join(PROJECT)
    }

    pub fn project_path(&self, key: &str) -> PathBuf {
        PROJECT_LAYOUT.path_for(&self.project_dir(), key).unwrap()
    }

    /// Write one brokered VCF with its index and record the brokering facts
    pub async fn seed_brokered(&self, eload: EloadId) -> PathBuf {
        let brokered_dir = self.temp.path().join("brokered").join(eload.to_string());
        std::fs::create_dir_all(&brokered_dir).unwrap();
        let vcf = brokered_dir.join("sample.vcf.gz");
        let index = brokered_dir.join("sample.vcf.gz.csi");
        std::fs::write(&vcf, b"vcf").unwrap();
        std::fs::write(&index, b"csi").unwrap();

        let vcf_key = vcf.to_string_lossy().into_owned();
        let mut checkpoint = self.checkpoint(eload).await;
        checkpoint
            .set(&["brokering", "vcf_files", vcf_key.as_str(), "index"], index.to_string_lossy().into_owned())
            .await
            .unwrap();
        checkpoint.set(facts::PROJECT_ACCESSION, PROJECT).await.unwrap();
        checkpoint.set(facts::ANALYSIS_ACCESSION, ANALYSIS).await.unwrap();
        vcf
    }

    /// Record the assembly and organism facts detection would have found
    pub async fn seed_submission(&self, eload: EloadId) {
        let mut checkpoint = self.checkpoint(eload).await;
        checkpoint.set(facts::ASSEMBLY_ACCESSION, ASSEMBLY).await.unwrap();
        checkpoint.set(facts::TAXONOMY_ID, TAXONOMY).await.unwrap();
        checkpoint.set(facts::SCIENTIFIC_NAME, "Homo sapiens").await.unwrap();
        checkpoint
            .set(facts::ASSEMBLY_FASTA, "/refs/GCA_000001405.15.fa")
            .await
            .unwrap();
        checkpoint
            .set(facts::ASSEMBLY_REPORT, "/refs/GCA_000001405.15_report.txt")
            .await
            .unwrap();
    }

    /// Brokered submission whose assembly maps to an existing database
    pub async fn seed_ready(&self, eload: EloadId) {
        self.seed_brokered(eload).await;
        self.seed_submission(eload).await;
        self.metadata.add_assembly(ASSEMBLY, TAXONOMY, DB_NAME);
        self.metadata.add_project(PROJECT, "Human variation study");
        self.variants.add_database(DB_NAME);
    }
}

pub fn read_yaml(path: &std::path::Path) -> serde_yaml::Value {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
    serde_yaml::from_str(&text).unwrap()
}
