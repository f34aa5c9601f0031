//! Repo: the store handle
//!
//! A repo is a marker directory (`.specimen`) holding the document store,
//! three TOML type registries, and a metadata side file. The handle is
//! cheap to clone (`Arc` inside) and is threaded through every record and
//! table, so multiple independent stores can coexist in one process.
//!
//! Repos open read-only. [`Repo::with_write`] runs a closure inside a
//! writable session: the read-only flag is restored and pending writes
//! are flushed on every exit path, including early `?` returns. A `Drop`
//! backstop covers panics.

use parking_lot::RwLock;
use serde_json::Value;
use specimen_core::{
    Error, FileCollection, KindTag, RecordKey, RecordRef, Result, ResultSchema, Status,
};
use specimen_storage::{
    DocStore, FileTypes, RepoMeta, ResultSchemas, SampleTypes, SideRegistry,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::identity::IdentityIndex;
use crate::record::Record;
use crate::records::{FileRecord, ResultRecord, SampleGroupRecord, SampleRecord};
use crate::table::{Caches, Table};

/// Name of the marker directory identifying a repo
pub const MARKER_DIR: &str = ".specimen";

const DB_FILE: &str = "specimen.db.json";
const SAMPLE_TYPES_FILE: &str = "sample-types.toml";
const FILE_TYPES_FILE: &str = "file-types.toml";
const RESULT_SCHEMAS_FILE: &str = "result-schemas.toml";
const META_FILE: &str = "repo-meta.toml";

/// Tunable parameters for a store handle
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Number of leading file bytes covered by the content checksum.
    ///
    /// The checksum is a partial fingerprint: a cheap freshness probe for
    /// files too large to hash in full.
    pub checksum_prefix_len: usize,
}

impl Default for RepoConfig {
    fn default() -> Self {
        RepoConfig {
            checksum_prefix_len: 4096,
        }
    }
}

pub(crate) struct RepoInner {
    base: PathBuf,
    marker: PathBuf,
    read_only: AtomicBool,
    config: RepoConfig,
    store: DocStore,
    sample_types: SideRegistry<SampleTypes>,
    file_types: SideRegistry<FileTypes>,
    result_schemas: SideRegistry<ResultSchemas>,
    meta: RepoMeta,
    index: RwLock<Option<IdentityIndex>>,
    pub(crate) caches: Caches,
}

/// Handle to one Specimen store
///
/// Cloning is cheap; all clones share the same caches, identity index,
/// and read-only flag.
#[derive(Clone)]
pub struct Repo {
    pub(crate) inner: Arc<RepoInner>,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("base", &self.inner.base)
            .finish_non_exhaustive()
    }
}

impl Repo {
    // === Opening ===

    /// Initialize a new store under `base_dir` and open it.
    ///
    /// Fails with [`Error::RepoAlreadyExists`] when a marker directory is
    /// already present.
    pub fn init(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base = base_dir.as_ref();
        let marker = base.join(MARKER_DIR);
        if marker.exists() {
            return Err(Error::RepoAlreadyExists(base.to_path_buf()));
        }
        std::fs::create_dir_all(&marker)?;
        info!(target: "specimen::repo", base = ?base, "repo initialized");
        Self::open(base)
    }

    /// Open the store whose marker directory sits directly under `base_dir`.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(base_dir, RepoConfig::default())
    }

    /// Open with explicit configuration.
    pub fn open_with_config(base_dir: impl AsRef<Path>, config: RepoConfig) -> Result<Self> {
        let base = base_dir.as_ref().to_path_buf();
        let marker = base.join(MARKER_DIR);
        if !marker.is_dir() {
            return Err(Error::NoRepoFound(base));
        }

        let store = DocStore::open(marker.join(DB_FILE))?;
        let sample_types = SideRegistry::open(marker.join(SAMPLE_TYPES_FILE))?;
        let file_types = SideRegistry::open(marker.join(FILE_TYPES_FILE))?;
        let result_schemas = SideRegistry::open(marker.join(RESULT_SCHEMAS_FILE))?;
        let meta = RepoMeta::load_or_create(&marker.join(META_FILE))?;

        info!(target: "specimen::repo", base = ?base, store_id = %meta.store_id, "repo opened");
        Ok(Repo {
            inner: Arc::new(RepoInner {
                base,
                marker,
                read_only: AtomicBool::new(true),
                config,
                store,
                sample_types,
                file_types,
                result_schemas,
                meta,
                index: RwLock::new(None),
                caches: Caches::default(),
            }),
        })
    }

    /// Walk up from `start_dir` looking for a marker directory.
    ///
    /// Fails with [`Error::NoRepoFound`] at the filesystem root.
    pub fn discover(start_dir: impl AsRef<Path>) -> Result<Self> {
        let start = start_dir.as_ref().canonicalize()?;
        let mut dir = start.as_path();
        loop {
            if dir.join(MARKER_DIR).is_dir() {
                return Self::open(dir);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(Error::NoRepoFound(start)),
            }
        }
    }

    // === Paths & metadata ===

    /// Directory containing the marker; all relative file paths resolve
    /// against it, making the store relocatable.
    pub fn base_path(&self) -> &Path {
        &self.inner.base
    }

    /// The marker directory holding the store's own files.
    pub fn marker_path(&self) -> &Path {
        &self.inner.marker
    }

    /// The generated store identifier.
    pub fn store_id(&self) -> Uuid {
        self.inner.meta.store_id
    }

    /// Store configuration.
    pub fn config(&self) -> &RepoConfig {
        &self.inner.config
    }

    /// Convert a path to store-relative form.
    ///
    /// Absolute paths must live under the store base; relative paths are
    /// taken as already store-relative.
    pub(crate) fn rel_path(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            path.strip_prefix(&self.inner.base)
                .map(Path::to_path_buf)
                .map_err(|_| {
                    Error::InvalidRecordState(format!(
                        "path_outside_repo:{}",
                        path.display()
                    ))
                })
        } else {
            Ok(path.to_path_buf())
        }
    }

    /// Resolve a store-relative path against the base directory.
    pub(crate) fn abs_path(&self, rel: &Path) -> PathBuf {
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.inner.base.join(rel)
        }
    }

    // === Writable sessions ===

    /// True unless inside a writable session.
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.load(Ordering::SeqCst)
    }

    /// Fail fast with [`Error::RepoReadOnly`] outside a writable session.
    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::RepoReadOnly);
        }
        Ok(())
    }

    /// Run `f` inside a writable session.
    ///
    /// The prior read-only state is restored and pending writes are
    /// flushed on every exit path: normal return, `?` propagation out of
    /// `f`, and (best effort) panic.
    pub fn with_write<T>(&self, f: impl FnOnce(&Repo) -> Result<T>) -> Result<T> {
        let session = WriteSession::begin(self.clone());
        let out = f(self);
        let closed = session.finish();
        match out {
            Ok(value) => closed.map(|()| value),
            Err(e) => {
                // The caller's error wins over a flush failure.
                let _ = closed;
                Err(e)
            }
        }
    }

    /// Flush pending document-store writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.inner.store.flush()
    }

    // === Tables ===

    /// The file-record table.
    pub fn files(&self) -> Table<FileRecord> {
        Table::new(self.clone())
    }

    /// The result-record table.
    pub fn results(&self) -> Table<ResultRecord> {
        Table::new(self.clone())
    }

    /// The sample-record table.
    pub fn samples(&self) -> Table<SampleRecord> {
        Table::new(self.clone())
    }

    /// The sample-group table.
    pub fn groups(&self) -> Table<SampleGroupRecord> {
        Table::new(self.clone())
    }

    pub(crate) fn store(&self) -> &DocStore {
        &self.inner.store
    }

    // === Identity ===

    /// Resolve a token (name, key, or record handle key) to a primary key.
    ///
    /// Names take precedence over keys; see the identity-index docs.
    pub fn resolve_key(&self, token: impl Into<RecordRef>) -> Result<RecordKey> {
        let token = token.into();
        self.with_index(|index| index.resolve_key(&token))
    }

    /// Resolve a token to a human-readable name.
    pub fn resolve_name(&self, token: impl Into<RecordRef>) -> Result<String> {
        let token = token.into();
        self.with_index(|index| index.resolve_name(&token))
    }

    /// True when no record of any kind holds this primary key.
    pub fn key_is_free(&self, key: &str) -> bool {
        self.with_index(|index| index.key_is_free(key))
    }

    /// True when no record of any kind holds this name.
    pub fn name_is_free(&self, name: &str) -> bool {
        self.with_index(|index| index.name_is_free(name))
    }

    /// Generate a fresh primary key, collision-checked against the index.
    pub(crate) fn generate_key(&self) -> Result<RecordKey> {
        const MAX_ATTEMPTS: usize = 128;
        for _ in 0..MAX_ATTEMPTS {
            let candidate = RecordKey::generate();
            if self.key_is_free(candidate.as_str()) {
                return Ok(candidate);
            }
        }
        Err(Error::Storage("primary key space exhausted".to_string()))
    }

    /// Run `f` against the identity index, building it on first access.
    pub(crate) fn with_index<R>(&self, f: impl FnOnce(&mut IdentityIndex) -> R) -> R {
        let mut guard = self.inner.index.write();
        let index = guard.get_or_insert_with(|| {
            IdentityIndex::build(|kind: KindTag| self.inner.store.all(kind.table_name()))
        });
        f(index)
    }

    // === Type registries ===

    /// Register a sample type. Idempotent.
    pub fn add_sample_type(&self, tag: &str) -> Result<()> {
        self.ensure_writable()?;
        self.inner.sample_types.mutate(|t| {
            t.types.insert(tag.to_string());
        })
    }

    /// All registered sample types.
    pub fn sample_types(&self) -> Vec<String> {
        self.inner
            .sample_types
            .read(|t| t.types.iter().cloned().collect())
    }

    /// Register a file type whose extension equals its tag.
    pub fn add_file_type(&self, tag: &str) -> Result<()> {
        self.add_file_type_ext(tag, tag)
    }

    /// Register a file type with an explicit extension.
    pub fn add_file_type_ext(&self, tag: &str, ext: &str) -> Result<()> {
        self.ensure_writable()?;
        self.inner.file_types.mutate(|t| {
            t.types.insert(tag.to_string(), ext.to_string());
        })
    }

    /// All registered file types, tag → extension.
    pub fn file_types(&self) -> BTreeMap<String, String> {
        self.inner.file_types.read(|t| t.types.clone())
    }

    /// Register (or replace) the schema for a result type.
    ///
    /// Replacing a schema intentionally invalidates existing results that
    /// no longer conform; that drift is surfaced by the status checks.
    pub fn add_result_schema(&self, tag: &str, schema: ResultSchema) -> Result<()> {
        self.ensure_writable()?;
        self.inner.result_schemas.mutate(|s| {
            s.schemas.insert(tag.to_string(), schema);
        })
    }

    /// All registered result types.
    pub fn result_types(&self) -> Vec<String> {
        self.inner
            .result_schemas
            .read(|s| s.schemas.keys().cloned().collect())
    }

    /// The schema registered for `tag`.
    pub fn result_schema(&self, tag: &str) -> Result<ResultSchema> {
        self.inner
            .result_schemas
            .read(|s| s.schemas.get(tag).cloned())
            .ok_or_else(|| Error::TypeNotFound(format!("result_type:{tag}")))
    }

    /// Validate a sample-type tag against the registry.
    pub fn validate_sample_type(&self, tag: &str) -> Result<String> {
        if self.inner.sample_types.read(|t| t.types.contains(tag)) {
            Ok(tag.to_string())
        } else {
            Err(Error::TypeNotFound(format!("sample_type:{tag}")))
        }
    }

    /// Validate a file-type tag against the registry.
    pub fn validate_file_type(&self, tag: &str) -> Result<String> {
        if self.inner.file_types.read(|t| t.types.contains_key(tag)) {
            Ok(tag.to_string())
        } else {
            Err(Error::TypeNotFound(format!("file_type:{tag}")))
        }
    }

    /// Validate a result-type tag against the schema registry.
    pub fn validate_result_type(&self, tag: &str) -> Result<String> {
        if self
            .inner
            .result_schemas
            .read(|s| s.schemas.contains_key(tag))
        {
            Ok(tag.to_string())
        } else {
            Err(Error::TypeNotFound(format!("result_type:{tag}")))
        }
    }

    // === Consistency sweep ===

    /// Status of every record in the store, per kind.
    ///
    /// Never fails: rows that cannot be instantiated report a diagnostic
    /// entry instead.
    pub fn check_all(&self) -> RepoStatus {
        RepoStatus {
            files: self.files().check_status(),
            results: self.results().check_status(),
            samples: self.samples().check_status(),
            sample_groups: self.groups().check_status(),
        }
    }

    // === Get-or-create conveniences ===

    /// Fetch the sample named `name`, creating and saving it if absent.
    pub fn get_or_make_sample(&self, name: &str, sample_type: &str) -> Result<SampleRecord> {
        if self.samples().exists(name)? {
            return self.samples().get(name);
        }
        let mut sample = SampleRecord::new(self, name, sample_type, &[])?;
        sample.save(false)
    }

    /// Fetch the file record named `name`, creating and saving it if absent.
    pub fn get_or_make_file(
        &self,
        name: &str,
        filepath: &Path,
        file_type: &str,
    ) -> Result<FileRecord> {
        if self.files().exists(name)? {
            return self.files().get(name);
        }
        let mut file = FileRecord::new(self, name, filepath, file_type)?;
        file.save(false)
    }

    /// Fetch the result named `name`, creating and saving it if absent.
    pub fn get_or_make_result(
        &self,
        name: &str,
        result_type: &str,
        files: FileCollection,
    ) -> Result<ResultRecord> {
        if self.results().exists(name)? {
            return self.results().get(name);
        }
        let mut result = ResultRecord::new(self, name, result_type, files)?;
        result.save(false)
    }
}

/// Per-kind status maps produced by [`Repo::check_all`]
#[derive(Debug, Clone)]
pub struct RepoStatus {
    /// name → status for file records
    pub files: BTreeMap<String, Status>,
    /// name → status for result records
    pub results: BTreeMap<String, Status>,
    /// name → status for sample records
    pub samples: BTreeMap<String, Status>,
    /// name → status for sample-group records
    pub sample_groups: BTreeMap<String, Status>,
}

impl RepoStatus {
    /// True when every record of every kind is valid.
    pub fn all_ok(&self) -> bool {
        self.files.values().all(|s| s.ok)
            && self.results.values().all(|s| s.ok)
            && self.samples.values().all(|s| s.ok)
            && self.sample_groups.values().all(|s| s.ok)
    }
}

/// Scoped writable session; restores the read-only flag and flushes on
/// close. The `Drop` impl is a panic backstop only.
struct WriteSession {
    repo: Repo,
    prior: bool,
    closed: bool,
}

impl WriteSession {
    fn begin(repo: Repo) -> Self {
        let prior = repo.inner.read_only.swap(false, Ordering::SeqCst);
        debug!(target: "specimen::repo", "writable session opened");
        WriteSession {
            repo,
            prior,
            closed: false,
        }
    }

    fn finish(mut self) -> Result<()> {
        self.closed = true;
        self.repo.inner.read_only.store(self.prior, Ordering::SeqCst);
        debug!(target: "specimen::repo", "writable session closed");
        self.repo.flush()
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        if !self.closed {
            self.repo.inner.read_only.store(self.prior, Ordering::SeqCst);
            let _ = self.repo.flush();
        }
    }
}

// Raw-row access used by the table layer; bypasses typed instantiation.
impl Repo {
    pub(crate) fn raw_rows(&self, kind: KindTag) -> Vec<Value> {
        self.inner.store.all(kind.table_name())
    }
}
