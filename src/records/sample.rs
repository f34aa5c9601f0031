//! Sample records: physical samples grouping computed results

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specimen_core::{Error, KindTag, Metadata, RecordKey, RecordRef, Result, Status};
use std::collections::BTreeSet;

use crate::record::{Record, RecordCore};
use crate::records::ResultRecord;
use crate::repo::Repo;

/// A physical sample and the results computed from it
#[derive(Debug, Clone)]
pub struct SampleRecord {
    core: RecordCore,
    sample_type: String,
    results: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct SampleRow {
    primary_key: Option<String>,
    name: String,
    #[serde(default)]
    metadata: Metadata,
    sample_type: String,
    #[serde(default)]
    results: BTreeSet<String>,
}

impl SampleRecord {
    /// Build a sample of a registered type.
    ///
    /// `results` tokens may be names or keys; each must resolve to a
    /// stored result record.
    pub fn new(repo: &Repo, name: &str, sample_type: &str, results: &[&str]) -> Result<Self> {
        let sample_type = repo.validate_sample_type(sample_type)?;
        let mut sample = SampleRecord {
            core: RecordCore::new(repo, name),
            sample_type,
            results: BTreeSet::new(),
        };
        for token in results {
            sample.add_result(*token)?;
        }
        Ok(sample)
    }

    /// Registered sample type of this sample.
    pub fn sample_type(&self) -> &str {
        &self.sample_type
    }

    /// Keys of the linked results.
    pub fn results(&self) -> &BTreeSet<String> {
        &self.results
    }

    /// Link a stored result to this sample. Idempotent.
    pub fn add_result(&mut self, token: impl Into<RecordRef>) -> Result<()> {
        let key = self.core.repo.resolve_key(token)?;
        if !self.core.repo.results().exists(&key)? {
            return Err(Error::NoSuchRecord(key.to_string()));
        }
        self.results.insert(key.as_str().to_string());
        self.core.status = OnceCell::new();
        Ok(())
    }

    /// Drop the link to `key`. Returns whether a link was removed.
    pub(crate) fn unlink_result(&mut self, key: &str) -> bool {
        let removed = self.results.remove(key);
        if removed {
            self.core.status = OnceCell::new();
        }
        removed
    }

    /// True when `key` is linked to this sample.
    pub fn contains_result(&self, key: &str) -> bool {
        self.results.contains(key)
    }

    /// Instantiate every linked result.
    pub fn result_records(&self) -> Result<Vec<ResultRecord>> {
        let table = self.core.repo.results();
        self.results
            .iter()
            .map(|k| table.get(RecordKey::new(k.clone())))
            .collect()
    }

    /// Linked results of one result type.
    pub fn results_of_type(&self, result_type: &str) -> Result<Vec<ResultRecord>> {
        Ok(self
            .result_records()?
            .into_iter()
            .filter(|r| r.result_type() == result_type)
            .collect())
    }
}

impl Record for SampleRecord {
    const KIND: KindTag = KindTag::Sample;

    fn from_row(repo: &Repo, row: Value) -> Result<Self> {
        let row: SampleRow = serde_json::from_value(row)?;
        Ok(SampleRecord {
            core: RecordCore::from_stored(repo, row.primary_key, row.name, row.metadata),
            sample_type: row.sample_type,
            results: row.results,
        })
    }

    fn to_row(&self) -> Result<Value> {
        let row = SampleRow {
            primary_key: self.core.key.as_ref().map(|k| k.as_str().to_string()),
            name: self.core.name.clone(),
            metadata: self.core.metadata.clone(),
            sample_type: self.sample_type.clone(),
            results: self.results.clone(),
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
        if self.core.repo.validate_sample_type(&self.sample_type).is_err() {
            return Status::fail(format!("unknown_sample_type:{}", self.sample_type));
        }
        let table = self.core.repo.results();
        for key in &self.results {
            match table.get(RecordKey::new(key.clone())) {
                Ok(result) => {
                    if !result.detailed_status().ok {
                        return Status::fail(format!("invalid_result:{key}"));
                    }
                }
                Err(e) if e.is_no_such_record() => {
                    return Status::fail(format!("missing_result:{key}"));
                }
                Err(e) => return Status::fail(e.to_string()),
            }
        }
        Status::all_good()
    }
}
