//! Configuration schema for the ingestion orchestrator

use crate::error::{EloadError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloadConfig {
    /// Root directories for submissions and projects
    #[serde(default)]
    pub paths: PathsConfig,

    /// Executable locations, passed through to the pipelines as `executable`
    #[serde(default = "default_executables")]
    pub executables: BTreeMap<String, String>,

    /// Jar locations, passed through to the pipelines as `jar`
    #[serde(default)]
    pub jars: BTreeMap<String, String>,

    /// Nextflow workflow scripts and JVM options
    #[serde(default)]
    pub nextflow: NextflowConfig,

    /// Relational metadata store (EVAPRO)
    #[serde(default)]
    pub metadata_store: MetadataStoreConfig,

    /// Document variant store
    #[serde(default)]
    pub variant_store: VariantStoreConfig,

    /// Pipeline-wide properties
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// identifiers.org resolution
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EloadConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            executables: default_executables(),
            jars: BTreeMap::new(),
            nextflow: NextflowConfig::default(),
            metadata_store: MetadataStoreConfig::default(),
            variant_store: VariantStoreConfig::default(),
            pipeline: PipelineConfig::default(),
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Root directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one `ELOAD_<n>` folder per submission
    pub eloads_dir: PathBuf,

    /// Directory holding one folder per project accession
    pub projects_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            eloads_dir: PathBuf::from("eloads"),
            projects_dir: PathBuf::from("projects"),
        }
    }
}

fn default_executables() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("nextflow".to_string(), "nextflow".to_string()),
        ("perl".to_string(), "perl".to_string()),
    ])
}

/// Nextflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextflowConfig {
    /// Path to the accessioning workflow
    pub accession_script: PathBuf,

    /// Path to the variant load workflow
    pub variant_load_script: PathBuf,

    /// Value of `NXF_OPTS` for the Nextflow JVM
    #[serde(default = "default_java_opts")]
    pub java_opts: String,
}

fn default_java_opts() -> String {
    "-Xms1g -Xmx8g".to_string()
}

impl Default for NextflowConfig {
    fn default() -> Self {
        Self {
            accession_script: PathBuf::from("nextflow/accession.nf"),
            variant_load_script: PathBuf::from("nextflow/variant_load.nf"),
            java_opts: default_java_opts(),
        }
    }
}

/// Metadata store connection (PostgreSQL)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataStoreConfig {
    /// JDBC URL, e.g. `jdbc:postgresql://pgsql-host:5432/evapro`.
    /// Passed verbatim to the pipelines.
    pub jdbc_url: String,

    pub user: String,

    /// Password (supports `${VAR}` interpolation)
    pub password: String,
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        Self {
            jdbc_url: "jdbc:postgresql://localhost:5432/evapro".to_string(),
            user: "evapro".to_string(),
            password: String::new(),
        }
    }
}

impl MetadataStoreConfig {
    /// Connection URL for the native driver, with the `jdbc:` prefix removed
    pub fn connection_url(&self) -> Result<&str> {
        self.jdbc_url.strip_prefix("jdbc:").ok_or_else(|| {
            EloadError::configuration(format!(
                "metadata_store.jdbc_url must start with 'jdbc:', got '{}'",
                self.jdbc_url
            ))
        })
    }
}

/// Variant store connection (MongoDB)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantStoreConfig {
    pub host: String,

    #[serde(default = "default_mongo_port")]
    pub port: u16,

    pub user: Option<String>,

    /// Password (supports `${VAR}` interpolation)
    pub password: Option<String>,

    #[serde(default = "default_auth_db")]
    pub authentication_database: String,

    /// Database used by the accessioning pipeline
    #[serde(default = "default_accession_db")]
    pub accession_database: String,
}

fn default_mongo_port() -> u16 {
    27017
}

fn default_auth_db() -> String {
    "admin".to_string()
}

fn default_accession_db() -> String {
    "eva_accession_sharded".to_string()
}

impl Default for VariantStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_mongo_port(),
            user: None,
            password: None,
            authentication_database: default_auth_db(),
            accession_database: default_accession_db(),
        }
    }
}

/// Pipeline-wide properties
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Properties file shared by every variant load job
    pub eva_pipeline_props: Option<PathBuf>,

    /// Root of the VEP cache
    pub vep_cache_path: Option<PathBuf>,

    /// Count-stats service used by the accessioning pipeline
    pub count_stats_url: Option<String>,
}

/// Settings for the identifiers.org CURIE resolver and the ENA browser lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_identifiers_url")]
    pub identifiers_url: String,

    /// Prefix of the ENA browser record endpoint; the project accession is appended
    #[serde(default = "default_ena_browser_url")]
    pub ena_browser_url: String,

    /// Attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: f64,

    #[serde(default = "default_backoff")]
    pub backoff_factor: f64,

    /// Extra random delay added to every wait, as `[min, max]` seconds
    #[serde(default = "default_jitter")]
    pub jitter_secs: (f64, f64),
}

fn default_identifiers_url() -> String {
    "https://resolver.api.identifiers.org/".to_string()
}

fn default_ena_browser_url() -> String {
    "https://www.ebi.ac.uk/ena/browser/api/xml/".to_string()
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_delay() -> f64 {
    2.0
}

fn default_backoff() -> f64 {
    1.2
}

fn default_jitter() -> (f64, f64) {
    (1.0, 3.0)
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            identifiers_url: default_identifiers_url(),
            ena_browser_url: default_ena_browser_url(),
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay(),
            backoff_factor: default_backoff(),
            jitter_secs: default_jitter(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl EloadConfig {
    /// Resolve `${VAR_NAME}` values from the environment
    pub fn resolve_env_vars(&mut self) {
        let store = &mut self.metadata_store;
        store.jdbc_url = Self::expand_env_var(&store.jdbc_url);
        store.user = Self::expand_env_var(&store.user);
        store.password = Self::expand_env_var(&store.password);

        let variants = &mut self.variant_store;
        variants.host = Self::expand_env_var(&variants.host);
        variants.user = variants.user.as_deref().map(Self::expand_env_var);
        variants.password = variants.password.as_deref().map(Self::expand_env_var);
    }

    /// Expand a whole-value `${VAR_NAME}` reference; unknown variables are kept verbatim
    fn expand_env_var(value: &str) -> String {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        }
    }

    /// Location of a named executable
    pub fn executable(&self, name: &str) -> Result<&str> {
        self.executables
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| EloadError::configuration(format!("no executable configured for '{}'", name)))
    }
}
