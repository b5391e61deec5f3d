//! Configuration loader
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.eload/eload.toml
//! 3. An explicit file given on the command line
//!
//! Later layers override earlier ones key by key, so a file only needs to
//! mention the values it changes.

use crate::config::schema::EloadConfig;
use crate::error::{EloadError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default configuration directory name
pub const CONFIG_DIR: &str = ".eload";

/// Default configuration file name
pub const CONFIG_FILE: &str = "eload.toml";

/// Configuration loader for the user-level and explicit config files
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    explicit_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader, optionally with an explicit config file
    pub fn new(explicit_config_path: Option<PathBuf>) -> Self {
        Self {
            user_config_path: Self::user_config_path(),
            explicit_config_path,
        }
    }

    /// Get user-level config path (~/.eload/eload.toml)
    fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load configuration with the explicit file taking precedence
    pub async fn load(&self) -> Result<EloadConfig> {
        let mut merged = match toml::Value::try_from(EloadConfig::default()) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => return Err(EloadError::configuration("default configuration is not a table")),
            Err(e) => {
                return Err(EloadError::configuration(format!(
                    "Failed to encode default configuration: {}",
                    e
                )))
            }
        };
        info!("Loading configuration with defaults");

        if let Some(user_path) = &self.user_config_path {
            if user_path.exists() {
                let table = self.load_table(user_path).await?;
                debug!(path = %user_path.display(), "Loaded user-level config");
                merge_tables(&mut merged, table);
            } else {
                debug!(path = %user_path.display(), "User-level config not found, using defaults");
            }
        }

        if let Some(explicit_path) = &self.explicit_config_path {
            let table = self.load_table(explicit_path).await?;
            debug!(path = %explicit_path.display(), "Loaded explicit config");
            merge_tables(&mut merged, table);
        }

        let mut config: EloadConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| EloadError::configuration(format!("Failed to parse config: {}", e)))?;
        config.resolve_env_vars();

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn load_table(&self, path: &Path) -> Result<toml::Table> {
        if !path.exists() {
            return Err(EloadError::configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| EloadError::configuration(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| EloadError::configuration(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    /// Get user config path
    pub fn get_user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }
}

/// Recursively overlay `overlay` onto `base`; tables merge, everything else replaces
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader_with(user: Option<PathBuf>, explicit: Option<PathBuf>) -> ConfigLoader {
        ConfigLoader {
            user_config_path: user,
            explicit_config_path: explicit,
        }
    }

    #[test]
    fn test_config_paths() {
        let loader = ConfigLoader::new(None);
        if let Some(user_path) = loader.get_user_config_path() {
            assert!(user_path.ends_with(".eload/eload.toml"));
        }
    }

    #[tokio::test]
    async fn test_load_returns_defaults_when_no_files() {
        let loader = loader_with(Some(PathBuf::from("/nonexistent/user.toml")), None);
        let config = loader.load().await.unwrap();

        assert_eq!(config.variant_store.port, 27017);
        assert_eq!(config.executable("nextflow").unwrap(), "nextflow");
    }

    #[tokio::test]
    async fn test_explicit_overrides_user_key_by_key() {
        let temp_dir = TempDir::new().unwrap();
        let user_path = temp_dir.path().join("user.toml");
        let explicit_path = temp_dir.path().join("explicit.toml");

        fs::write(
            &user_path,
            r#"
[paths]
eloads_dir = "/nfs/eloads"
projects_dir = "/nfs/projects"

[variant_store]
host = "mongo-user"
user = "eva"
"#,
        )
        .await
        .unwrap();
        fs::write(
            &explicit_path,
            r#"
[variant_store]
host = "mongo-prod"

[executables]
load_from_ena = "/opt/eva/load_from_ena.pl"
"#,
        )
        .await
        .unwrap();

        let config = loader_with(Some(user_path), Some(explicit_path)).load().await.unwrap();

        assert_eq!(config.paths.eloads_dir, PathBuf::from("/nfs/eloads"));
        assert_eq!(config.variant_store.host, "mongo-prod");
        assert_eq!(config.variant_store.user.as_deref(), Some("eva"));
        assert_eq!(config.executable("load_from_ena").unwrap(), "/opt/eva/load_from_ena.pl");
        assert_eq!(config.executable("perl").unwrap(), "perl");
    }

    #[tokio::test]
    async fn test_partial_section_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let explicit_path = temp_dir.path().join("explicit.toml");
        fs::write(&explicit_path, "[paths]\neloads_dir = \"/data/eloads\"\n")
            .await
            .unwrap();

        let config = loader_with(None, Some(explicit_path)).load().await.unwrap();

        assert_eq!(config.paths.eloads_dir, PathBuf::from("/data/eloads"));
        assert_eq!(config.paths.projects_dir, PathBuf::from("projects"));
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let loader = loader_with(None, Some(PathBuf::from("/nonexistent/explicit.toml")));
        let err = loader.load().await.unwrap_err();

        assert!(matches!(err, EloadError::Configuration(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let explicit_path = temp_dir.path().join("bad.toml");
        fs::write(&explicit_path, "[paths\neloads_dir = 1").await.unwrap();

        let err = loader_with(None, Some(explicit_path)).load().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_wrong_types_are_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let explicit_path = temp_dir.path().join("typed.toml");
        fs::write(&explicit_path, "[variant_store]\nport = \"not a number\"\n")
            .await
            .unwrap();

        let err = loader_with(None, Some(explicit_path)).load().await.unwrap_err();
        assert!(matches!(err, EloadError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_env_var_expansion_in_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let explicit_path = temp_dir.path().join("creds.toml");
        fs::write(
            &explicit_path,
            "[metadata_store]\npassword = \"${ELOAD_LOADER_TEST_PASS}\"\n",
        )
        .await
        .unwrap();
        std::env::set_var("ELOAD_LOADER_TEST_PASS", "s3cret");

        let config = loader_with(None, Some(explicit_path)).load().await.unwrap();
        assert_eq!(config.metadata_store.password, "s3cret");

        std::env::remove_var("ELOAD_LOADER_TEST_PASS");
    }

    #[test]
    fn test_merge_tables_nested() {
        let mut base: toml::Table = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Table = toml::from_str("[a]\ny = 3\n[b]\nz = 4\n").unwrap();

        merge_tables(&mut base, overlay);

        assert_eq!(base["a"]["x"].as_integer(), Some(1));
        assert_eq!(base["a"]["y"].as_integer(), Some(3));
        assert_eq!(base["b"]["z"].as_integer(), Some(4));
    }
}
