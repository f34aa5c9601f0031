//! JSON-file-backed document store
//!
//! One file holds every collection. In memory the store is a map of
//! table name → rows; each row is a JSON object with a stable [`RowId`]
//! assigned at insert and never reused within a session.
//!
//! Mutations mark the store dirty; [`DocStore::flush`] persists the whole
//! store atomically (temp file + rename). Callers decide when to flush —
//! the writable-session layer flushes on every exit path.

use parking_lot::RwLock;
use serde_json::Value;
use specimen_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::fsio;

/// Stable identity of a row within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct TableData {
    rows: BTreeMap<u64, Value>,
    next_id: u64,
}

struct StoreData {
    tables: BTreeMap<String, TableData>,
    dirty: bool,
}

/// Structured document store with table-scoped operations
pub struct DocStore {
    path: PathBuf,
    inner: RwLock<StoreData>,
}

impl DocStore {
    /// Open the store file, creating an empty store if the file is absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut tables = BTreeMap::new();

        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let parsed: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_str(&text)
                .map_err(|e| Error::Storage(format!("corrupt store file {path:?}: {e}")))?;
            for (table, raw_rows) in parsed {
                let mut data = TableData::default();
                for (id, row) in raw_rows {
                    let id: u64 = id
                        .parse()
                        .map_err(|_| Error::Storage(format!("bad row id {id:?} in {table}")))?;
                    data.next_id = data.next_id.max(id + 1);
                    data.rows.insert(id, row);
                }
                tables.insert(table, data);
            }
        }

        Ok(DocStore {
            path,
            inner: RwLock::new(StoreData {
                tables,
                dirty: false,
            }),
        })
    }

    /// Number of rows in a table.
    pub fn len(&self, table: &str) -> usize {
        self.inner
            .read()
            .tables
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// True when a table holds no rows.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// All rows of a table, in insertion order.
    pub fn all(&self, table: &str) -> Vec<Value> {
        self.inner
            .read()
            .tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// First row whose `field` equals `value`, with its row id.
    pub fn find_by_field(&self, table: &str, field: &str, value: &str) -> Option<(RowId, Value)> {
        let inner = self.inner.read();
        let data = inner.tables.get(table)?;
        data.rows
            .iter()
            .find(|(_, row)| row.get(field).and_then(Value::as_str) == Some(value))
            .map(|(id, row)| (RowId(*id), row.clone()))
    }

    /// Insert a row, returning its stable id.
    pub fn insert(&self, table: &str, row: Value) -> RowId {
        let mut inner = self.inner.write();
        let data = inner.tables.entry(table.to_string()).or_default();
        let id = data.next_id;
        data.next_id += 1;
        data.rows.insert(id, row);
        inner.dirty = true;
        debug!(target: "specimen::storage", table, row_id = id, "row inserted");
        RowId(id)
    }

    /// Replace the row at `id`.
    pub fn update(&self, table: &str, id: RowId, row: Value) -> Result<()> {
        let mut inner = self.inner.write();
        let data = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::Storage(format!("no such table: {table}")))?;
        match data.rows.get_mut(&id.0) {
            Some(slot) => {
                *slot = row;
                inner.dirty = true;
                Ok(())
            }
            None => Err(Error::Storage(format!("no row {id} in table {table}"))),
        }
    }

    /// Replace the first row whose `field` equals `value`.
    pub fn update_by_field(&self, table: &str, field: &str, value: &str, row: Value) -> Result<()> {
        match self.find_by_field(table, field, value) {
            Some((id, _)) => self.update(table, id, row),
            None => Err(Error::Storage(format!(
                "no row with {field}={value} in table {table}"
            ))),
        }
    }

    /// Remove every row whose `field` equals `value`. Returns removed count.
    pub fn remove_by_field(&self, table: &str, field: &str, value: &str) -> usize {
        let mut inner = self.inner.write();
        let Some(data) = inner.tables.get_mut(table) else {
            return 0;
        };
        let doomed: Vec<u64> = data
            .rows
            .iter()
            .filter(|(_, row)| row.get(field).and_then(Value::as_str) == Some(value))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            data.rows.remove(id);
        }
        if !doomed.is_empty() {
            inner.dirty = true;
        }
        doomed.len()
    }

    /// True when unflushed mutations exist.
    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    /// Persist the store atomically if dirty.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.dirty {
            return Ok(());
        }
        let mut out: BTreeMap<&str, BTreeMap<String, &Value>> = BTreeMap::new();
        for (table, data) in &inner.tables {
            let rows = data
                .rows
                .iter()
                .map(|(id, row)| (id.to_string(), row))
                .collect();
            out.insert(table, rows);
        }
        let text = serde_json::to_string_pretty(&out)?;
        fsio::atomic_write(&self.path, text.as_bytes())?;
        inner.dirty = false;
        debug!(target: "specimen::storage", path = ?self.path, "store flushed");
        Ok(())
    }
}
