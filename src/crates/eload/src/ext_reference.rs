//! External references (publications and other cross-references) for projects
//!
//! A reference `DB:ID` is accepted only for a project that is public in ENA,
//! and only if identifiers.org can resolve it to at least one reachable URL.
//! Accepted references are stored once in the metadata store and linked to
//! the project once.

use crate::config::ResolverConfig;
use crate::error::{EloadError, Result};
use crate::resolver::MetadataStore;
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

pub const LINK_TYPE: &str = "publication";
pub const SOURCE_OBJECT: &str = "project";

/// Resolves compact identifiers (`PubMed:32908231`)
#[async_trait]
pub trait CurieResolver: Send + Sync {
    async fn resolves(&self, curie: &str) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct ResolverResponse {
    payload: Option<ResolverPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolverPayload {
    #[serde(default)]
    resolved_resources: Vec<ResolvedResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedResource {
    compact_identifier_resolved_url: String,
    #[serde(default)]
    description: String,
}

/// identifiers.org resolution API client
#[derive(Debug, Clone)]
pub struct IdentifiersOrgResolver {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl IdentifiersOrgResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &ResolverConfig) -> Self {
        Self {
            client,
            base_url: config.identifiers_url.clone(),
            policy: RetryPolicy::from(config),
        }
    }

    async fn resolve_once(&self, curie: &str) -> Result<bool> {
        let url = format!("{}{}", self.base_url, curie);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.is_client_error() {
            warn!(curie, status = %status, "identifiers.org does not know this identifier");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(EloadError::External(format!("{} returned {}", url, status)));
        }

        let body: ResolverResponse = response.json().await?;
        let resources = body.payload.map(|p| p.resolved_resources).unwrap_or_default();
        for resource in resources {
            let head = self
                .client
                .head(&resource.compact_identifier_resolved_url)
                .send()
                .await?;
            if head.status().is_success() {
                return Ok(true);
            }
            warn!(curie, resource = %resource.description, status = %head.status(), "Cannot resolve identifier");
        }
        Ok(false)
    }
}

#[async_trait]
impl CurieResolver for IdentifiersOrgResolver {
    async fn resolves(&self, curie: &str) -> Result<bool> {
        with_retry(
            &self.policy,
            "identifiers.org lookup",
            |e| matches!(e, EloadError::External(_)),
            || self.resolve_once(curie),
        )
        .await
    }
}

/// Answers whether a project accession is public in ENA
#[async_trait]
pub trait EnaProjectLookup: Send + Sync {
    async fn is_public(&self, project_accession: &str) -> Result<bool>;
}

/// ENA browser API client; a project is public when its record can be downloaded
#[derive(Debug, Clone)]
pub struct EnaBrowserClient {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl EnaBrowserClient {
    pub fn new(config: &ResolverConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &ResolverConfig) -> Self {
        Self {
            client,
            base_url: config.ena_browser_url.clone(),
            policy: RetryPolicy::from(config),
        }
    }

    async fn lookup_once(&self, project_accession: &str) -> Result<bool> {
        let url = format!("{}{}", self.base_url, project_accession);
        let status = self.client.get(&url).send().await?.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.is_client_error() {
            warn!(project = project_accession, status = %status, "ENA has no public record for this project");
            return Ok(false);
        }
        Err(EloadError::External(format!("{} returned {}", url, status)))
    }
}

#[async_trait]
impl EnaProjectLookup for EnaBrowserClient {
    async fn is_public(&self, project_accession: &str) -> Result<bool> {
        with_retry(
            &self.policy,
            "ENA project lookup",
            |e| matches!(e, EloadError::External(_)),
            || self.lookup_once(project_accession),
        )
        .await
    }
}

/// What [`ExtReferenceLinker::add`] changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOutcome {
    pub dbxref_id: i64,
    pub created_reference: bool,
    pub linked_project: bool,
}

/// Adds external references to projects in the metadata store
pub struct ExtReferenceLinker {
    metadata: Arc<dyn MetadataStore>,
    ena: Arc<dyn EnaProjectLookup>,
    resolver: Arc<dyn CurieResolver>,
}

impl ExtReferenceLinker {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        ena: Arc<dyn EnaProjectLookup>,
        resolver: Arc<dyn CurieResolver>,
    ) -> Self {
        Self {
            metadata,
            ena,
            resolver,
        }
    }

    pub async fn add(&self, project_accession: &str, source_database: &str, identifier: &str) -> Result<LinkOutcome> {
        if !self.metadata.project_exists(project_accession).await? {
            return Err(EloadError::precondition(format!(
                "{} does not exist in the metadata store",
                project_accession
            )));
        }
        if !self.ena.is_public(project_accession).await? {
            return Err(EloadError::precondition(format!(
                "{} does not exist or is not public in ENA",
                project_accession
            )));
        }

        let curie = format!("{}:{}", source_database, identifier);
        if !self.resolver.resolves(&curie).await? {
            return Err(EloadError::precondition(format!(
                "cannot resolve {} in identifiers.org",
                curie
            )));
        }

        warn!(project = project_accession, curie = %curie, "Uploading external references to ENA is not supported; do this manually");

        let (dbxref_id, created_reference) = match self.metadata.dbxref_id(source_database, identifier).await? {
            Some(id) => (id, false),
            None => {
                let id = self
                    .metadata
                    .insert_dbxref(source_database, identifier, LINK_TYPE, SOURCE_OBJECT)
                    .await?;
                (id, true)
            }
        };

        let linked_project = if self.metadata.project_dbxref_exists(project_accession, dbxref_id).await? {
            false
        } else {
            self.metadata.link_project_dbxref(project_accession, dbxref_id).await?;
            true
        };

        info!(
            project = project_accession,
            curie = %curie,
            dbxref_id,
            created_reference,
            linked_project,
            "External reference recorded"
        );
        Ok(LinkOutcome {
            dbxref_id,
            created_reference,
            linked_project,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryMetadataStore, StaticCurieResolver, StaticEnaProjects};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn linker(metadata: &InMemoryMetadataStore, known: &[&str]) -> ExtReferenceLinker {
        ExtReferenceLinker::new(
            Arc::new(metadata.clone()),
            Arc::new(StaticEnaProjects::new(["PRJEB1000", "PRJEB2000"])),
            Arc::new(StaticCurieResolver::new(known.iter().copied())),
        )
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let metadata = InMemoryMetadataStore::new();
        metadata.add_project("PRJEB1000", "A study");
        let linker = linker(&metadata, &["PubMed:123"]);

        let first = linker.add("PRJEB1000", "PubMed", "123").await.unwrap();
        let second = linker.add("PRJEB1000", "PubMed", "123").await.unwrap();

        assert!(first.created_reference && first.linked_project);
        assert!(!second.created_reference && !second.linked_project);
        assert_eq!(first.dbxref_id, second.dbxref_id);
        assert_eq!(metadata.dbxref_count(), 1);
        assert_eq!(metadata.project_dbxref_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_reference_is_linked_to_another_project() {
        let metadata = InMemoryMetadataStore::new();
        metadata.add_project("PRJEB1000", "A study");
        metadata.add_project("PRJEB2000", "Another study");
        let linker = linker(&metadata, &["PubMed:123"]);

        linker.add("PRJEB1000", "PubMed", "123").await.unwrap();
        let outcome = linker.add("PRJEB2000", "PubMed", "123").await.unwrap();

        assert!(!outcome.created_reference);
        assert!(outcome.linked_project);
        assert_eq!(metadata.project_dbxref_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_project_is_rejected() {
        let metadata = InMemoryMetadataStore::new();
        let err = linker(&metadata, &["PubMed:123"])
            .add("PRJEB9", "PubMed", "123")
            .await
            .unwrap_err();
        assert!(matches!(err, EloadError::Precondition(_)));
        assert_eq!(metadata.dbxref_count(), 0);
    }

    #[tokio::test]
    async fn test_project_missing_from_ena_is_rejected() {
        let metadata = InMemoryMetadataStore::new();
        metadata.add_project("PRJEB3000", "Private study");

        let err = linker(&metadata, &["PubMed:123"])
            .add("PRJEB3000", "PubMed", "123")
            .await
            .unwrap_err();

        assert!(matches!(err, EloadError::Precondition(_)), "{}", err);
        assert!(err.to_string().contains("not public in ENA"), "{}", err);
        assert_eq!(metadata.dbxref_count(), 0);
        assert_eq!(metadata.project_dbxref_count(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_identifier_is_rejected() {
        let metadata = InMemoryMetadataStore::new();
        metadata.add_project("PRJEB1000", "A study");

        let err = linker(&metadata, &[]).add("PRJEB1000", "PubMed", "999").await.unwrap_err();

        assert!(err.to_string().contains("PubMed:999"));
        assert_eq!(metadata.dbxref_count(), 0);
    }

    /// Minimal HTTP server: the resolver endpoint under `/resolve/`, the ENA
    /// browser under `/ena/` knowing only PRJEB1000, one reachable page and
    /// one missing page
    async fn serve(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let page_base = base.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let line = request.lines().next().unwrap_or_default().to_string();

                let (status, body) = if line.starts_with("GET /ena/") {
                    let seen = counter.fetch_add(1, Ordering::SeqCst);
                    if seen < fail_first {
                        ("503 Service Unavailable", String::new())
                    } else if line.starts_with("GET /ena/PRJEB1000 ") {
                        ("200 OK", "<PROJECT_SET/>".to_string())
                    } else {
                        ("404 Not Found", String::new())
                    }
                } else if line.starts_with("GET /resolve/") {
                    let seen = counter.fetch_add(1, Ordering::SeqCst);
                    if seen < fail_first {
                        ("503 Service Unavailable", String::new())
                    } else if line.contains("PubMed:123") {
                        let json = format!(
                            r#"{{"payload":{{"resolvedResources":[
                                {{"compactIdentifierResolvedUrl":"{0}/missing","description":"mirror"}},
                                {{"compactIdentifierResolvedUrl":"{0}/page","description":"main"}}]}}}}"#,
                            page_base
                        );
                        ("200 OK", json)
                    } else {
                        ("400 Bad Request", r#"{"errorMessage":"unknown"}"#.to_string())
                    }
                } else if line.starts_with("HEAD /page") {
                    ("200 OK", String::new())
                } else {
                    ("404 Not Found", String::new())
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (base, hits)
    }

    fn local_resolver(base: &str) -> IdentifiersOrgResolver {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        IdentifiersOrgResolver::with_client(client, &fast_config(base))
    }

    fn fast_config(base: &str) -> ResolverConfig {
        ResolverConfig {
            identifiers_url: format!("{}/resolve/", base),
            ena_browser_url: format!("{}/ena/", base),
            max_attempts: 3,
            initial_delay_secs: 0.0,
            backoff_factor: 1.0,
            jitter_secs: (0.0, 0.0),
        }
    }

    #[tokio::test]
    async fn test_identifiers_org_resolves_through_any_reachable_url() {
        let (base, _) = serve(0).await;
        let resolver = local_resolver(&base);

        assert!(resolver.resolves("PubMed:123").await.unwrap());
        assert!(!resolver.resolves("PubMed:999").await.unwrap());
    }

    #[tokio::test]
    async fn test_identifiers_org_retries_server_errors() {
        let (base, hits) = serve(2).await;
        let resolver = local_resolver(&base);

        assert!(resolver.resolves("PubMed:123").await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_identifiers_org_gives_up_after_max_attempts() {
        let (base, hits) = serve(10).await;
        let resolver = local_resolver(&base);

        let err = resolver.resolves("PubMed:123").await.unwrap_err();
        assert!(matches!(err, EloadError::External(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    fn local_ena(base: &str) -> EnaBrowserClient {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        EnaBrowserClient::with_client(client, &fast_config(base))
    }

    #[tokio::test]
    async fn test_ena_browser_distinguishes_public_projects() {
        let (base, _) = serve(0).await;
        let ena = local_ena(&base);

        assert!(ena.is_public("PRJEB1000").await.unwrap());
        assert!(!ena.is_public("PRJEB3000").await.unwrap());
    }

    #[tokio::test]
    async fn test_ena_browser_retries_server_errors() {
        let (base, hits) = serve(1).await;

        assert!(local_ena(&base).is_public("PRJEB1000").await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
