//! Typed table facades over the document store
//!
//! A [`Table`] is a stateless, cheaply constructed view of one record
//! kind's rows. The actual caches live on the repo handle so every table
//! instance for a kind shares them:
//!
//! - raw rows, filled by one store scan on first access
//! - a primary-key → position index, built lazily over the cached rows
//!
//! Inserts and updates refresh the caches in place. Removal invalidates
//! every kind's caches, since records reference each other across tables
//! and a stale cross-reference is worse than a re-scan.

use parking_lot::RwLock;
use serde_json::Value;
use specimen_core::{Error, KindTag, RecordKey, RecordRef, Result, Status};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use tracing::debug;

use crate::record::Record;
use crate::repo::Repo;

#[derive(Default)]
pub(crate) struct RowCache {
    rows: Option<Vec<Value>>,
    key_index: Option<HashMap<String, usize>>,
}

/// Per-kind row caches shared by all tables of one repo handle
#[derive(Default)]
pub(crate) struct Caches {
    files: RwLock<RowCache>,
    results: RwLock<RowCache>,
    samples: RwLock<RowCache>,
    groups: RwLock<RowCache>,
}

impl Caches {
    fn slot(&self, kind: KindTag) -> &RwLock<RowCache> {
        match kind {
            KindTag::File => &self.files,
            KindTag::Result => &self.results,
            KindTag::Sample => &self.samples,
            KindTag::SampleGroup => &self.groups,
        }
    }

    pub(crate) fn clear_all(&self) {
        for slot in [&self.files, &self.results, &self.samples, &self.groups] {
            *slot.write() = RowCache::default();
        }
    }
}

/// View of one record kind's table
pub struct Table<R: Record> {
    repo: Repo,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for Table<R> {
    fn clone(&self) -> Self {
        Table {
            repo: self.repo.clone(),
            _kind: PhantomData,
        }
    }
}

impl<R: Record> Table<R> {
    pub(crate) fn new(repo: Repo) -> Self {
        Table {
            repo,
            _kind: PhantomData,
        }
    }

    fn slot(&self) -> &RwLock<RowCache> {
        self.repo.inner.caches.slot(R::KIND)
    }

    /// All raw rows, from cache or one store scan.
    fn rows(&self) -> Vec<Value> {
        {
            let read = self.slot().read();
            if let Some(rows) = &read.rows {
                return rows.clone();
            }
        }
        let fresh = self.repo.raw_rows(R::KIND);
        let mut write = self.slot().write();
        match &write.rows {
            Some(rows) => rows.clone(),
            None => {
                write.rows = Some(fresh.clone());
                fresh
            }
        }
    }

    /// Position of the row holding `key`, via the lazy key index.
    fn index_of(&self, key: &str) -> Option<usize> {
        {
            let read = self.slot().read();
            if let (Some(_), Some(index)) = (&read.rows, &read.key_index) {
                return index.get(key).copied();
            }
        }
        let rows = self.rows();
        let built: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                row.get("primary_key")
                    .and_then(Value::as_str)
                    .map(|k| (k.to_string(), i))
            })
            .collect();
        let found = built.get(key).copied();
        self.slot().write().key_index = Some(built);
        found
    }

    /// Number of rows in this table.
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    /// True when this table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    /// Names of every record in this table.
    pub fn names(&self) -> Vec<String> {
        self.rows()
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// True when `token` resolves to a record of this kind.
    ///
    /// An unresolvable token is `Ok(false)`, not an error; a token owned
    /// by another kind is also `Ok(false)`.
    pub fn exists(&self, token: impl Into<RecordRef>) -> Result<bool> {
        match self.repo.resolve_key(token) {
            Ok(key) => Ok(self.index_of(key.as_str()).is_some()),
            Err(e) if e.is_no_such_record() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn get_raw(&self, key: &RecordKey) -> Result<Value> {
        match self.index_of(key.as_str()) {
            Some(i) => self
                .rows()
                .get(i)
                .cloned()
                .ok_or_else(|| Error::NoSuchRecord(key.to_string())),
            None => Err(Error::NoSuchRecord(key.to_string())),
        }
    }

    /// Fetch one record by name, key, or handle.
    pub fn get(&self, token: impl Into<RecordRef>) -> Result<R> {
        let key = self.repo.resolve_key(token)?;
        let row = self.get_raw(&key)?;
        R::from_row(&self.repo, row)
    }

    /// Fetch several records; fails on the first miss.
    pub fn get_many<I, T>(&self, tokens: I) -> Result<Vec<R>>
    where
        I: IntoIterator<Item = T>,
        T: Into<RecordRef>,
    {
        tokens.into_iter().map(|t| self.get(t)).collect()
    }

    /// Instantiate every record in this table.
    ///
    /// Fails on the first row that cannot be instantiated; use
    /// [`Table::check_status`] for a fault-tolerant sweep.
    pub fn get_all(&self) -> Result<Vec<R>> {
        self.rows()
            .into_iter()
            .map(|row| R::from_row(&self.repo, row))
            .collect()
    }

    /// Insert a draft row, assigning a primary key.
    pub(crate) fn insert_row(&self, mut row: Value) -> Result<R> {
        self.repo.ensure_writable()?;
        let name = row
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidRecordState("row_missing_name".to_string()))?;
        if !self.repo.name_is_free(&name) {
            return Err(Error::name_exists(&name));
        }
        let key = match row.get("primary_key").and_then(Value::as_str) {
            Some(k) if !self.repo.key_is_free(k) => return Err(Error::key_exists(k)),
            Some(k) => RecordKey::new(k.to_string()),
            None => self.repo.generate_key()?,
        };
        if let Some(map) = row.as_object_mut() {
            map.insert(
                "primary_key".to_string(),
                Value::String(key.as_str().to_string()),
            );
        }

        self.repo.store().insert(R::KIND.table_name(), row.clone());
        {
            let mut write = self.slot().write();
            let write = &mut *write;
            if let Some(rows) = &mut write.rows {
                if let Some(index) = &mut write.key_index {
                    index.insert(key.as_str().to_string(), rows.len());
                }
                rows.push(row.clone());
            }
        }
        self.repo.with_index(|ix| ix.register(key.as_str(), &name));
        debug!(target: "specimen::table", kind = ?R::KIND, name = %name, key = key.as_str(), "record inserted");
        R::from_row(&self.repo, row)
    }

    /// Replace the stored row for `key`. The name must not change here;
    /// renames go through [`Table::rename`] so the identity index stays
    /// consistent.
    pub(crate) fn update_row(&self, key: &RecordKey, row: Value) -> Result<R> {
        self.repo.ensure_writable()?;
        let stored = self.get_raw(key)?;
        let stored_name = stored.get("name").and_then(Value::as_str).unwrap_or("");
        let new_name = row.get("name").and_then(Value::as_str).unwrap_or("");
        if stored_name != new_name {
            return Err(Error::InvalidRecordState(format!(
                "name_change_requires_rename:{stored_name}"
            )));
        }

        self.repo
            .store()
            .update_by_field(R::KIND.table_name(), "primary_key", key.as_str(), row.clone())?;
        self.refresh_cached_row(key, row.clone());
        R::from_row(&self.repo, row)
    }

    /// Change the name of the record holding `key`.
    pub(crate) fn rename(&self, key: &RecordKey, new_name: &str) -> Result<()> {
        self.repo.ensure_writable()?;
        let mut stored = self.get_raw(key)?;
        let old_name = stored
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if old_name == new_name {
            return Ok(());
        }
        if !self.repo.name_is_free(new_name) {
            return Err(Error::name_exists(new_name));
        }
        if let Some(map) = stored.as_object_mut() {
            map.insert("name".to_string(), Value::String(new_name.to_string()));
        }
        self.repo.store().update_by_field(
            R::KIND.table_name(),
            "primary_key",
            key.as_str(),
            stored.clone(),
        )?;
        self.refresh_cached_row(key, stored);
        self.repo
            .with_index(|ix| ix.rename(key.as_str(), &old_name, new_name));
        debug!(target: "specimen::table", kind = ?R::KIND, old_name = %old_name, new_name = %new_name, "record renamed");
        Ok(())
    }

    fn refresh_cached_row(&self, key: &RecordKey, row: Value) {
        let mut write = self.slot().write();
        let position = write
            .key_index
            .as_ref()
            .and_then(|ix| ix.get(key.as_str()).copied());
        match (position, &mut write.rows) {
            (Some(i), Some(rows)) if i < rows.len() => rows[i] = row,
            _ => *write = RowCache::default(),
        }
    }

    /// Delete the row `token` resolves to.
    ///
    /// This is a plain row removal; it does not touch records that
    /// reference the removed one. Cascading cleanup lives on the record
    /// kinds that need it.
    pub fn remove(&self, token: impl Into<RecordRef>) -> Result<()> {
        self.repo.ensure_writable()?;
        let key = self.repo.resolve_key(token)?;
        let row = self.get_raw(&key)?;
        let name = row
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let removed =
            self.repo
                .store()
                .remove_by_field(R::KIND.table_name(), "primary_key", key.as_str());
        if removed == 0 {
            return Err(Error::NoSuchRecord(key.to_string()));
        }
        // Cross-kind references may now dangle; drop every cache.
        self.repo.inner.caches.clear_all();
        self.repo.with_index(|ix| ix.unregister(key.as_str(), &name));
        debug!(target: "specimen::table", kind = ?R::KIND, name = %name, key = key.as_str(), "record removed");
        Ok(())
    }

    /// Keys of every row that is invalid or cannot be instantiated.
    pub fn invalid_keys(&self) -> Vec<RecordKey> {
        self.rows()
            .into_iter()
            .filter_map(|row| {
                let key = row
                    .get("primary_key")
                    .and_then(Value::as_str)
                    .map(str::to_string)?;
                let bad = match R::from_row(&self.repo, row) {
                    Ok(record) => !record.detailed_status().ok,
                    Err(_) => true,
                };
                bad.then(|| RecordKey::new(key))
            })
            .collect()
    }

    /// Remove every invalid row. Returns the number removed.
    pub fn remove_invalids(&self) -> Result<usize> {
        self.repo.ensure_writable()?;
        let mut removed = 0;
        for key in self.invalid_keys() {
            match self.remove(key) {
                Ok(()) => removed += 1,
                Err(e) if e.is_no_such_record() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// Status of every record in this table, keyed by name.
    ///
    /// Never fails: a row that cannot be instantiated reports a
    /// `could_not_instantiate_record:` diagnostic instead.
    pub fn check_status(&self) -> BTreeMap<String, Status> {
        let mut out = BTreeMap::new();
        for row in self.rows() {
            let label = row
                .get("name")
                .and_then(Value::as_str)
                .or_else(|| row.get("primary_key").and_then(Value::as_str))
                .unwrap_or("<unnamed>")
                .to_string();
            let status = match R::from_row(&self.repo, row) {
                Ok(record) => record.detailed_status(),
                Err(e) => Status::fail(format!("could_not_instantiate_record:{e}")),
            };
            out.insert(label, status);
        }
        out
    }
}
