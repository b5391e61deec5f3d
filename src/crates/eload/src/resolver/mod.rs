//! External resource resolution
//!
//! Facts that depend on the environment rather than on the submission: which
//! variant store database an assembly/taxonomy pair loads into, whether that
//! database exists, and the project records in the metadata store. Store
//! access goes through the [`MetadataStore`] and [`VariantStore`] traits so
//! the orchestrator can run against in-memory stores in tests.

mod mongo;
mod postgres;

pub use mongo::MongoVariantStore;
pub use postgres::PostgresMetadataStore;

use crate::error::{EloadError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of registering an assembly/taxonomy mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    AlreadyPresent,
}

/// Relational metadata store (EVAPRO)
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Variant store database registered for an assembly/taxonomy pair
    async fn variant_db_name(&self, assembly_accession: &str, taxonomy_id: u32) -> Result<Option<String>>;

    /// Register the pair under `db_name`; an existing mapping is left alone
    async fn register_assembly(
        &self,
        assembly_accession: &str,
        taxonomy_id: u32,
        db_name: &DatabaseName,
    ) -> Result<Registration>;

    /// Titles of every project row with this accession
    async fn study_titles(&self, project_accession: &str) -> Result<Vec<String>>;

    async fn project_exists(&self, project_accession: &str) -> Result<bool>;

    /// Id of the cross-reference `db:id`, if recorded
    async fn dbxref_id(&self, db: &str, id: &str) -> Result<Option<i64>>;

    async fn insert_dbxref(&self, db: &str, id: &str, link_type: &str, source_object: &str) -> Result<i64>;

    async fn project_dbxref_exists(&self, project_accession: &str, dbxref_id: i64) -> Result<bool>;

    async fn link_project_dbxref(&self, project_accession: &str, dbxref_id: i64) -> Result<()>;
}

/// Document variant store
#[async_trait]
pub trait VariantStore: Send + Sync {
    /// Names of every database in the store's catalog
    async fn database_names(&self) -> Result<Vec<String>>;
}

/// Variant store database name of the form `eva_<taxonomy_code>_<assembly_code>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseName {
    name: String,
    taxonomy_code: String,
    assembly_code: String,
}

impl DatabaseName {
    pub const PREFIX: &'static str = "eva_";

    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || {
            EloadError::precondition(format!(
                "database name '{}' does not match eva_<taxonomy_code>_<assembly_code>",
                name
            ))
        };
        let rest = name.strip_prefix(Self::PREFIX).ok_or_else(invalid)?;
        let (taxonomy_code, assembly_code) = rest.split_once('_').ok_or_else(invalid)?;
        let valid_code = |code: &str| {
            !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if !valid_code(taxonomy_code) || !valid_code(assembly_code) {
            return Err(invalid());
        }
        Ok(Self {
            name: name.to_string(),
            taxonomy_code: taxonomy_code.to_string(),
            assembly_code: assembly_code.to_string(),
        })
    }

    pub fn from_codes(taxonomy_code: &str, assembly_code: &str) -> Result<Self> {
        Self::parse(&format!("{}{}_{}", Self::PREFIX, taxonomy_code, assembly_code))
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn taxonomy_code(&self) -> &str {
        &self.taxonomy_code
    }

    pub fn assembly_code(&self) -> &str {
        &self.assembly_code
    }
}

impl std::fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resolves database identity against the metadata and variant stores
#[derive(Clone)]
pub struct ResourceResolver {
    metadata: Arc<dyn MetadataStore>,
    variants: Arc<dyn VariantStore>,
}

impl ResourceResolver {
    pub fn new(metadata: Arc<dyn MetadataStore>, variants: Arc<dyn VariantStore>) -> Self {
        Self { metadata, variants }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Database registered for the pair, or `None` when no mapping exists yet
    pub async fn resolve_database_name(
        &self,
        assembly_accession: &str,
        taxonomy_id: u32,
    ) -> Result<Option<String>> {
        let name = self
            .metadata
            .variant_db_name(assembly_accession, taxonomy_id)
            .await?;
        match &name {
            Some(name) => info!(assembly = assembly_accession, taxonomy = taxonomy_id, db_name = %name, "Resolved variant database"),
            None => warn!(
                assembly = assembly_accession,
                taxonomy = taxonomy_id,
                "No variant database registered; insert the assembly and taxonomy or pass the database name explicitly"
            ),
        }
        Ok(name)
    }

    /// Exact, case-sensitive match against the variant store catalog
    pub async fn verify_database_exists(&self, name: &str) -> Result<bool> {
        let names = self.variants.database_names().await?;
        let exists = names.iter().any(|candidate| candidate == name);
        if exists {
            info!(db_name = name, "Found variant database");
        } else {
            warn!(db_name = name, "Variant database does not exist");
        }
        Ok(exists)
    }

    /// Record the mapping; a mapping that already exists only produces a warning
    pub async fn register_database_mapping(
        &self,
        assembly_accession: &str,
        taxonomy_id: u32,
        name: &DatabaseName,
    ) -> Result<Registration> {
        let outcome = self
            .metadata
            .register_assembly(assembly_accession, taxonomy_id, name)
            .await?;
        match outcome {
            Registration::Inserted => {
                info!(assembly = assembly_accession, taxonomy = taxonomy_id, db_name = %name, "Registered variant database")
            }
            Registration::AlreadyPresent => {
                warn!(assembly = assembly_accession, taxonomy = taxonomy_id, db_name = %name, "Assembly and taxonomy already registered")
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryMetadataStore, InMemoryVariantStore};

    fn resolver(metadata: InMemoryMetadataStore, variants: InMemoryVariantStore) -> ResourceResolver {
        ResourceResolver::new(Arc::new(metadata), Arc::new(variants))
    }

    #[test]
    fn test_database_name_parsing() {
        let name = DatabaseName::parse("eva_hsapiens_grch38").unwrap();
        assert_eq!(name.taxonomy_code(), "hsapiens");
        assert_eq!(name.assembly_code(), "grch38");
        assert_eq!(DatabaseName::from_codes("btaurus", "umd31").unwrap().as_str(), "eva_btaurus_umd31");

        for bad in ["hsapiens_grch38", "eva_hsapiens", "eva__grch38", "eva_hs-apiens_grch38"] {
            assert!(
                matches!(DatabaseName::parse(bad), Err(EloadError::Precondition(_))),
                "{}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_unregistered_pair_resolves_to_none() {
        let resolver = resolver(InMemoryMetadataStore::new(), InMemoryVariantStore::new());
        assert_eq!(resolver.resolve_database_name("GCA_1.1", 9606).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_database_existence_is_exact_match() {
        let resolver = resolver(
            InMemoryMetadataStore::new(),
            InMemoryVariantStore::with_databases(["eva_hsapiens_grch38"]),
        );

        assert!(resolver.verify_database_exists("eva_hsapiens_grch38").await.unwrap());
        assert!(!resolver.verify_database_exists("eva_hsapiens_GRCh38").await.unwrap());
        assert!(!resolver.verify_database_exists("eva_hsapiens_grch3").await.unwrap());
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let metadata = InMemoryMetadataStore::new();
        let resolver = resolver(metadata.clone(), InMemoryVariantStore::new());
        let name = DatabaseName::parse("eva_hsapiens_grch38").unwrap();

        let first = resolver.register_database_mapping("GCA_1.1", 9606, &name).await.unwrap();
        let second = resolver.register_database_mapping("GCA_1.1", 9606, &name).await.unwrap();

        assert_eq!(first, Registration::Inserted);
        assert_eq!(second, Registration::AlreadyPresent);
        assert_eq!(metadata.assembly_count(), 1);
        assert_eq!(
            resolver.resolve_database_name("GCA_1.1", 9606).await.unwrap().as_deref(),
            Some("eva_hsapiens_grch38")
        );
    }

    #[tokio::test]
    async fn test_store_outage_is_retryable() {
        let variants = InMemoryVariantStore::new();
        variants.set_unavailable(true);
        let resolver = resolver(InMemoryMetadataStore::new(), variants);

        let err = resolver.verify_database_exists("eva_x_y").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
