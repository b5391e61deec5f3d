//! In-memory collaborators for tests
//!
//! - [`InMemoryMetadataStore`] and [`InMemoryVariantStore`] stand in for the
//!   two databases and can be switched to "unavailable"
//! - [`RecordingProcessRunner`] records invocations instead of spawning
//!   processes, with scripted exit codes
//! - [`StaticCurieResolver`] resolves a fixed set of identifiers
//! - [`StaticEnaProjects`] treats a fixed set of projects as public
//!
//! All of them are cheap to clone; clones share state, so a test keeps one
//! handle for assertions and gives another to the code under test.

use crate::error::{EloadError, Result};
use crate::ext_reference::{CurieResolver, EnaProjectLookup};
use crate::process::{Invocation, ProcessOutcome, ProcessRunner};
use crate::resolver::{DatabaseName, MetadataStore, Registration, VariantStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct MetadataState {
    /// (assembly accession, taxonomy id) -> database name
    assemblies: BTreeMap<(String, u32), String>,
    /// project accession -> titles
    projects: BTreeMap<String, Vec<String>>,
    /// (db, id) -> dbxref id
    dbxrefs: BTreeMap<(String, String), i64>,
    project_dbxrefs: BTreeSet<(String, i64)>,
    registrations: usize,
}

/// Metadata store held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    state: Arc<Mutex<MetadataState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_assembly(&self, assembly_accession: &str, taxonomy_id: u32, db_name: &str) {
        lock(&self.state)
            .assemblies
            .insert((assembly_accession.to_string(), taxonomy_id), db_name.to_string());
    }

    /// Add a project row; adding the same accession twice creates a duplicate row
    pub fn add_project(&self, project_accession: &str, title: &str) {
        lock(&self.state)
            .projects
            .entry(project_accession.to_string())
            .or_default()
            .push(title.to_string());
    }

    pub fn assembly_count(&self) -> usize {
        lock(&self.state).assemblies.len()
    }

    /// Calls to `register_assembly`, including duplicates
    pub fn registration_calls(&self) -> usize {
        lock(&self.state).registrations
    }

    pub fn dbxref_count(&self) -> usize {
        lock(&self.state).dbxrefs.len()
    }

    pub fn project_dbxref_count(&self) -> usize {
        lock(&self.state).project_dbxrefs.len()
    }

    /// Make every call fail as if the database were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(EloadError::metadata_store("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn variant_db_name(&self, assembly_accession: &str, taxonomy_id: u32) -> Result<Option<String>> {
        self.check_available()?;
        Ok(lock(&self.state)
            .assemblies
            .get(&(assembly_accession.to_string(), taxonomy_id))
            .cloned())
    }

    async fn register_assembly(
        &self,
        assembly_accession: &str,
        taxonomy_id: u32,
        db_name: &DatabaseName,
    ) -> Result<Registration> {
        self.check_available()?;
        let mut state = lock(&self.state);
        state.registrations += 1;
        let key = (assembly_accession.to_string(), taxonomy_id);
        if state.assemblies.contains_key(&key) {
            return Ok(Registration::AlreadyPresent);
        }
        state.assemblies.insert(key, db_name.to_string());
        Ok(Registration::Inserted)
    }

    async fn study_titles(&self, project_accession: &str) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(lock(&self.state)
            .projects
            .get(project_accession)
            .cloned()
            .unwrap_or_default())
    }

    async fn project_exists(&self, project_accession: &str) -> Result<bool> {
        self.check_available()?;
        Ok(lock(&self.state).projects.contains_key(project_accession))
    }

    async fn dbxref_id(&self, db: &str, id: &str) -> Result<Option<i64>> {
        self.check_available()?;
        Ok(lock(&self.state)
            .dbxrefs
            .get(&(db.to_string(), id.to_string()))
            .copied())
    }

    async fn insert_dbxref(&self, db: &str, id: &str, _link_type: &str, _source_object: &str) -> Result<i64> {
        self.check_available()?;
        let mut state = lock(&self.state);
        let next = state.dbxrefs.len() as i64 + 1;
        Ok(*state
            .dbxrefs
            .entry((db.to_string(), id.to_string()))
            .or_insert(next))
    }

    async fn project_dbxref_exists(&self, project_accession: &str, dbxref_id: i64) -> Result<bool> {
        self.check_available()?;
        Ok(lock(&self.state)
            .project_dbxrefs
            .contains(&(project_accession.to_string(), dbxref_id)))
    }

    async fn link_project_dbxref(&self, project_accession: &str, dbxref_id: i64) -> Result<()> {
        self.check_available()?;
        lock(&self.state)
            .project_dbxrefs
            .insert((project_accession.to_string(), dbxref_id));
        Ok(())
    }
}

/// Variant store catalog held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryVariantStore {
    databases: Arc<Mutex<BTreeSet<String>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryVariantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_databases<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        lock(&store.databases).extend(names.into_iter().map(Into::into));
        store
    }

    pub fn add_database(&self, name: &str) {
        lock(&self.databases).insert(name.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl VariantStore for InMemoryVariantStore {
    async fn database_names(&self) -> Result<Vec<String>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EloadError::variant_store("server selection timeout"));
        }
        Ok(lock(&self.databases).iter().cloned().collect())
    }
}

/// Process runner that records invocations and returns scripted exit codes
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessRunner {
    invocations: Arc<Mutex<Vec<Invocation>>>,
    /// (substring of the command line, exit code); first match wins
    scripted: Arc<Mutex<Vec<(String, i32)>>>,
}

impl RecordingProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `code` whenever the command line contains `needle`
    pub fn exit_with(&self, needle: &str, code: i32) {
        lock(&self.scripted).push((needle.to_string(), code));
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        lock(&self.invocations).clone()
    }

    pub fn invocation_count(&self) -> usize {
        lock(&self.invocations).len()
    }
}

#[async_trait]
impl ProcessRunner for RecordingProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome> {
        let command = invocation.display_command();
        let code = lock(&self.scripted)
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);

        if let Some(parent) = invocation.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EloadError::io(parent, e))?;
        }
        std::fs::write(&invocation.log_path, format!("{}\nexit {}\n", command, code))
            .map_err(|e| EloadError::io(&invocation.log_path, e))?;

        lock(&self.invocations).push(invocation.clone());
        Ok(ProcessOutcome::exited(code))
    }
}

/// Resolves exactly the identifiers it was given
#[derive(Debug, Clone, Default)]
pub struct StaticCurieResolver {
    known: HashSet<String>,
}

impl StaticCurieResolver {
    pub fn new<'a>(known: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            known: known.into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl CurieResolver for StaticCurieResolver {
    async fn resolves(&self, curie: &str) -> Result<bool> {
        Ok(self.known.contains(curie))
    }
}

/// Public ENA projects known up front
#[derive(Debug, Clone, Default)]
pub struct StaticEnaProjects {
    public: HashSet<String>,
}

impl StaticEnaProjects {
    pub fn new<'a>(public: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            public: public.into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl EnaProjectLookup for StaticEnaProjects {
    async fn is_public(&self, project_accession: &str) -> Result<bool> {
        Ok(self.public.contains(project_accession))
    }
}
