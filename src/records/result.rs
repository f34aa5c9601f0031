//! Result records: schema-shaped collections of file records
//!
//! A result is the unit of computed output. Its file references are
//! shaped by the schema registered for its result type and stored as
//! primary keys, so renames of the referenced files never break it.
//!
//! Results own their files: the cascading [`ResultRecord::remove`]
//! unlinks the result from every sample referencing it, deletes the
//! owned file rows, then deletes the result's own row.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specimen_core::{
    Error, FileCollection, KindTag, Metadata, RecordKey, RecordRef, Result, Status,
};
use tracing::info;

use crate::record::{Record, RecordCore};
use crate::records::FileRecord;
use crate::repo::Repo;

/// A computed result grouping one or more file records
#[derive(Debug, Clone)]
pub struct ResultRecord {
    core: RecordCore,
    result_type: String,
    files: FileCollection,
    previous_results: Vec<String>,
    provenance: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ResultRow {
    primary_key: Option<String>,
    name: String,
    #[serde(default)]
    metadata: Metadata,
    result_type: String,
    files: FileCollection,
    #[serde(default)]
    previous_results: Vec<String>,
    #[serde(default)]
    provenance: Vec<String>,
}

impl ResultRecord {
    /// Build a result of a registered type.
    ///
    /// File references in `files` may be names or keys; they are resolved
    /// to primary keys here. Unknown map keys are silently dropped per the
    /// lenient conform rule; use [`ResultRecord::new_strict`] to reject
    /// them instead.
    pub fn new(
        repo: &Repo,
        name: &str,
        result_type: &str,
        files: FileCollection,
    ) -> Result<Self> {
        Self::build(repo, name, result_type, files, false)
    }

    /// Like [`ResultRecord::new`], but an unknown map key is an error.
    pub fn new_strict(
        repo: &Repo,
        name: &str,
        result_type: &str,
        files: FileCollection,
    ) -> Result<Self> {
        Self::build(repo, name, result_type, files, true)
    }

    fn build(
        repo: &Repo,
        name: &str,
        result_type: &str,
        files: FileCollection,
        strict: bool,
    ) -> Result<Self> {
        let result_type = repo.validate_result_type(result_type)?;
        let schema = repo.result_schema(&result_type)?;
        let resolved = resolve_collection(repo, files)?;
        let files = schema.conform(resolved, strict, &result_type, None)?;
        Ok(ResultRecord {
            core: RecordCore::new(repo, name),
            result_type,
            files,
            previous_results: Vec::new(),
            provenance: Vec::new(),
        })
    }

    /// Registered result type of this result.
    pub fn result_type(&self) -> &str {
        &self.result_type
    }

    /// The schema-shaped file-key collection.
    pub fn files(&self) -> &FileCollection {
        &self.files
    }

    /// Upstream result keys this result was derived from.
    pub fn previous_results(&self) -> &[String] {
        &self.previous_results
    }

    /// Free-text notes on how this result was produced.
    pub fn provenance(&self) -> &[String] {
        &self.provenance
    }

    /// Append a provenance note.
    pub fn add_provenance(&mut self, note: impl Into<String>) {
        self.provenance.push(note.into());
    }

    /// Link an upstream result this one was derived from.
    pub fn add_previous_result(&mut self, token: impl Into<RecordRef>) -> Result<()> {
        let key = self.core.repo.resolve_key(token)?;
        if !self.core.repo.results().exists(&key)? {
            return Err(Error::NoSuchRecord(key.to_string()));
        }
        let key = key.as_str().to_string();
        if !self.previous_results.contains(&key) {
            self.previous_results.push(key);
        }
        Ok(())
    }

    /// Replace the file collection, re-shaping it to the schema.
    pub fn set_files(&mut self, files: FileCollection) -> Result<()> {
        let schema = self.core.repo.result_schema(&self.result_type)?;
        let resolved = resolve_collection(&self.core.repo, files)?;
        self.files = schema.conform(
            resolved,
            false,
            &self.result_type,
            self.core.key.as_ref().map(|k| k.as_str()),
        )?;
        self.core.status = OnceCell::new();
        Ok(())
    }

    /// Instantiate every referenced file record.
    pub fn file_records(&self) -> Result<Vec<FileRecord>> {
        let table = self.core.repo.files();
        self.files
            .keys()
            .into_iter()
            .map(|k| table.get(RecordKey::new(k)))
            .collect()
    }

    /// Cascading removal: unlink this result from every sample, delete
    /// the owned file rows, then delete this result's row.
    ///
    /// Files already gone are tolerated; the goal is a store without
    /// dangling references to this result. Requires a saved record and a
    /// writable session.
    pub fn remove(self) -> Result<()> {
        let repo = self.core.repo.clone();
        repo.ensure_writable()?;
        let key = self.core.key.clone().ok_or_else(|| {
            Error::InvalidRecordState(format!("remove_before_save:{}", self.core.name))
        })?;

        for sample in repo.samples().get_all()? {
            let mut sample = sample;
            if sample.unlink_result(key.as_str()) {
                sample.save(true)?;
            }
        }

        for file_key in self.files.keys() {
            match repo.files().remove(RecordKey::new(file_key)) {
                Ok(()) => {}
                Err(e) if e.is_no_such_record() => {}
                Err(e) => return Err(e),
            }
        }

        info!(target: "specimen::records", name = %self.core.name, "result removed with cascade");
        repo.results().remove(key)
    }
}

impl Record for ResultRecord {
    const KIND: KindTag = KindTag::Result;

    fn from_row(repo: &Repo, row: Value) -> Result<Self> {
        let row: ResultRow = serde_json::from_value(row)?;
        Ok(ResultRecord {
            core: RecordCore::from_stored(repo, row.primary_key, row.name, row.metadata),
            result_type: row.result_type,
            files: row.files,
            previous_results: row.previous_results,
            provenance: row.provenance,
        })
    }

    fn to_row(&self) -> Result<Value> {
        let row = ResultRow {
            primary_key: self.core.key.as_ref().map(|k| k.as_str().to_string()),
            name: self.core.name.clone(),
            metadata: self.core.metadata.clone(),
            result_type: self.result_type.clone(),
            files: self.files.clone(),
            previous_results: self.previous_results.clone(),
            provenance: self.provenance.clone(),
        };
        serde_json::to_value(row).map_err(Error::from)
    }

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn compute_status(&self) -> Status {
        let schema = match self.core.repo.result_schema(&self.result_type) {
            Ok(schema) => schema,
            Err(_) => return Status::fail(format!("unknown_result_type:{}", self.result_type)),
        };
        if let Err(drift) = schema.check_shape(&self.files) {
            return Status::fail(drift);
        }
        let table = self.core.repo.files();
        for file_key in self.files.keys() {
            match table.get(RecordKey::new(file_key)) {
                Ok(file) => {
                    if !file.detailed_status().ok {
                        return Status::fail(format!("invalid_file_record:{file_key}"));
                    }
                }
                Err(e) if e.is_no_such_record() => {
                    return Status::fail(format!("missing_file_record:{file_key}"));
                }
                Err(e) => return Status::fail(e.to_string()),
            }
        }
        Status::all_good()
    }
}

/// Resolve every file token in a draft collection to a primary key.
fn resolve_collection(repo: &Repo, given: FileCollection) -> Result<FileCollection> {
    Ok(match given {
        FileCollection::List(tokens) => FileCollection::List(
            tokens
                .into_iter()
                .map(|t| repo.resolve_key(t).map(String::from))
                .collect::<Result<_>>()?,
        ),
        FileCollection::Map(tokens) => FileCollection::Map(
            tokens
                .into_iter()
                .map(|(slot, t)| repo.resolve_key(t).map(|k| (slot, String::from(k))))
                .collect::<Result<_>>()?,
        ),
        FileCollection::Scalar(token) => {
            FileCollection::Scalar(String::from(repo.resolve_key(token)?))
        }
    })
}
