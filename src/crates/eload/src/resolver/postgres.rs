//! PostgreSQL metadata store (EVAPRO)

use super::{DatabaseName, MetadataStore, Registration};
use crate::config::MetadataStoreConfig;
use crate::error::{EloadError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use tracing::debug;

/// Metadata store backed by a lazily connected Postgres pool
#[derive(Clone, Debug)]
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    /// Build the pool without connecting; the first query opens a connection
    pub fn connect_lazy(config: &MetadataStoreConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(config.connection_url()?)
            .map_err(|e| EloadError::configuration(format!("Invalid metadata store URL: {}", e)))?
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_lazy_with(options);

        debug!(url = %config.jdbc_url, "Metadata store pool created");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Split `GCA_000001405.15` into its chain and version
fn split_assembly_accession(accession: &str) -> Result<(&str, i32)> {
    accession
        .rsplit_once('.')
        .and_then(|(chain, version)| version.parse().ok().map(|v| (chain, v)))
        .ok_or_else(|| {
            EloadError::precondition(format!(
                "assembly accession '{}' has no version suffix",
                accession
            ))
        })
}

const INSERT_TAXONOMY: &str = "INSERT INTO evapro.taxonomy (taxonomy_id, taxonomy_code)
     VALUES ($1, $2)
     ON CONFLICT DO NOTHING";

const INSERT_ASSEMBLY: &str = "INSERT INTO evapro.assembly
         (assembly_accession, assembly_chain, assembly_version, assembly_code, taxonomy_id)
     VALUES ($1, $2, $3, $4, $5)
     ON CONFLICT DO NOTHING";

/// A conflicting concurrent registration leaves the assembly insert without rows
fn registration_from_rows(rows_affected: u64) -> Registration {
    if rows_affected == 0 {
        Registration::AlreadyPresent
    } else {
        Registration::Inserted
    }
}

/// Connection trouble is retryable; a rejected statement is not
fn metadata_error(err: sqlx::Error) -> EloadError {
    let transient = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err.code().map_or(false, |code| is_transient_sqlstate(&code)),
        _ => false,
    };
    if transient {
        EloadError::metadata_store(err)
    } else {
        EloadError::store("metadata", err)
    }
}

/// Connection exceptions, insufficient resources, operator intervention and serialization failures
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("53") || code.starts_with("57P") || code == "40001"
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn variant_db_name(&self, assembly_accession: &str, taxonomy_id: u32) -> Result<Option<String>> {
        let name = sqlx::query_scalar::<_, Option<String>>(
            "SELECT 'eva_' || t.taxonomy_code || '_' || a.assembly_code
             FROM evapro.assembly a
             JOIN evapro.taxonomy t ON t.taxonomy_id = a.taxonomy_id
             WHERE a.assembly_accession = $1 AND a.taxonomy_id = $2",
        )
        .bind(assembly_accession)
        .bind(i64::from(taxonomy_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(metadata_error)?;

        Ok(name.flatten())
    }

    async fn register_assembly(
        &self,
        assembly_accession: &str,
        taxonomy_id: u32,
        db_name: &DatabaseName,
    ) -> Result<Registration> {
        let (chain, version) = split_assembly_accession(assembly_accession)?;
        let taxonomy_id = i64::from(taxonomy_id);

        let mut tx = self.pool.begin().await.map_err(metadata_error)?;

        sqlx::query(INSERT_TAXONOMY)
            .bind(taxonomy_id)
            .bind(db_name.taxonomy_code())
            .execute(&mut *tx)
            .await
            .map_err(metadata_error)?;

        let inserted = sqlx::query(INSERT_ASSEMBLY)
            .bind(assembly_accession)
            .bind(chain)
            .bind(version)
            .bind(db_name.assembly_code())
            .bind(taxonomy_id)
            .execute(&mut *tx)
            .await
            .map_err(metadata_error)?;

        tx.commit().await.map_err(metadata_error)?;
        Ok(registration_from_rows(inserted.rows_affected()))
    }

    async fn study_titles(&self, project_accession: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT title FROM evapro.project WHERE project_accession = $1")
            .bind(project_accession)
            .fetch_all(&self.pool)
            .await
            .map_err(metadata_error)
    }

    async fn project_exists(&self, project_accession: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM evapro.project WHERE project_accession = $1)",
        )
        .bind(project_accession)
        .fetch_one(&self.pool)
        .await
        .map_err(metadata_error)
    }

    async fn dbxref_id(&self, db: &str, id: &str) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT dbxref_id::bigint FROM evapro.dbxref WHERE db = $1 AND id = $2",
        )
        .bind(db)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(metadata_error)
    }

    async fn insert_dbxref(&self, db: &str, id: &str, link_type: &str, source_object: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO evapro.dbxref (db, id, link_type, source_object)
             VALUES ($1, $2, $3, $4)
             RETURNING dbxref_id::bigint",
        )
        .bind(db)
        .bind(id)
        .bind(link_type)
        .bind(source_object)
        .fetch_one(&self.pool)
        .await
        .map_err(metadata_error)
    }

    async fn project_dbxref_exists(&self, project_accession: &str, dbxref_id: i64) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM evapro.project_dbxref
                            WHERE project_accession = $1 AND dbxref_id = $2)",
        )
        .bind(project_accession)
        .bind(dbxref_id)
        .fetch_one(&self.pool)
        .await
        .map_err(metadata_error)
    }

    async fn link_project_dbxref(&self, project_accession: &str, dbxref_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO evapro.project_dbxref (project_accession, dbxref_id) VALUES ($1, $2)")
            .bind(project_accession)
            .bind(dbxref_id)
            .execute(&self.pool)
            .await
            .map_err(metadata_error)?;
        Ok(())
    }
}
