//! Record trait and shared lifecycle
//!
//! Every record kind embeds a [`RecordCore`] (repo handle, identity,
//! metadata, memoized status) and implements [`Record`] for row
//! conversion and validity checking. The lifecycle operations — save,
//! rename, delete — are provided methods so all four kinds behave
//! identically.
//!
//! ## Save semantics
//!
//! [`Record::save`] resolves to exactly one of five outcomes:
//!
//! - unsaved, name free: inserted as a new row with a generated key
//! - unsaved, name taken, `modify` unset: rejected with `RecordExists`
//! - unsaved, name taken by a same-kind row, `modify` set: merged into
//!   that row — the stored row's identity persists, the draft's fields
//!   win (a cross-kind name collision is always rejected)
//! - saved, `modify` unset: rejected with `RecordExists`
//! - saved, `modify` set: the draft's fields merge into the stored row,
//!   leaving fields absent from the draft untouched
//!
//! A validity check runs before every write; no row is ever stored in a
//! known-invalid state.

use once_cell::sync::OnceCell;
use serde_json::Value;
use specimen_core::{Error, KindTag, Metadata, RecordKey, Result, Status};
use std::fmt;

use crate::repo::Repo;
use crate::table::Table;

/// State shared by every record kind
#[derive(Clone)]
pub struct RecordCore {
    pub(crate) repo: Repo,
    pub(crate) key: Option<RecordKey>,
    pub(crate) name: String,
    pub(crate) metadata: Metadata,
    pub(crate) status: OnceCell<Status>,
}

impl RecordCore {
    pub(crate) fn new(repo: &Repo, name: &str) -> Self {
        RecordCore {
            repo: repo.clone(),
            key: None,
            name: name.to_string(),
            metadata: Metadata::new(),
            status: OnceCell::new(),
        }
    }

    pub(crate) fn from_stored(
        repo: &Repo,
        key: Option<String>,
        name: String,
        metadata: Metadata,
    ) -> Self {
        RecordCore {
            repo: repo.clone(),
            key: key.map(RecordKey::new),
            name,
            metadata,
            status: OnceCell::new(),
        }
    }
}

impl fmt::Debug for RecordCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCore")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Common behavior of the four record kinds
pub trait Record: Sized {
    /// Which table this kind lives in.
    const KIND: KindTag;

    /// Instantiate from a stored row.
    fn from_row(repo: &Repo, row: Value) -> Result<Self>;

    /// Serialize to the row form stored in the document store.
    fn to_row(&self) -> Result<Value>;

    /// Shared record state.
    fn core(&self) -> &RecordCore;

    /// Shared record state, mutable.
    fn core_mut(&mut self) -> &mut RecordCore;

    /// Compute validity from scratch. Implementations must not fail;
    /// problems become a failed [`Status`].
    fn compute_status(&self) -> Status;

    // === Provided lifecycle ===

    /// The store this record belongs to.
    fn repo(&self) -> &Repo {
        &self.core().repo
    }

    /// Human-readable, globally unique name.
    fn name(&self) -> &str {
        &self.core().name
    }

    /// Primary key, once saved.
    fn key(&self) -> Option<&RecordKey> {
        self.core().key.as_ref()
    }

    /// True once the record has a stored row.
    fn is_saved(&self) -> bool {
        self.core().key.is_some()
    }

    /// Free-form metadata stored alongside the record.
    fn metadata(&self) -> &Metadata {
        &self.core().metadata
    }

    /// Mutable access to the metadata map.
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.core_mut().metadata
    }

    /// The table this record belongs to.
    fn table(&self) -> Table<Self> {
        Table::new(self.core().repo.clone())
    }

    /// True when a record of this kind with this name is stored.
    fn exists(&self) -> Result<bool> {
        self.table().exists(self.core().name.as_str())
    }

    /// Validity status, computed on first call and memoized for the
    /// lifetime of this instance. Re-fetch the record for a fresh check.
    fn detailed_status(&self) -> Status {
        self.core()
            .status
            .get_or_init(|| self.compute_status())
            .clone()
    }

    /// Shorthand for `detailed_status().ok`.
    fn valid_status(&self) -> bool {
        self.detailed_status().ok
    }

    /// Persist this record; see the module docs for the outcome matrix.
    ///
    /// Returns the stored form. Requires a writable session. The record
    /// is validated first: an invalid record is rejected with
    /// [`Error::InvalidRecordState`] rather than written.
    fn save(&mut self, modify: bool) -> Result<Self> {
        let repo = self.core().repo.clone();
        repo.ensure_writable()?;
        let status = self.compute_status();
        if !status.ok {
            return Err(Error::InvalidRecordState(status.message));
        }
        let table: Table<Self> = Table::new(repo.clone());

        let saved = match self.core().key.clone() {
            Some(key) => {
                if !modify {
                    return Err(Error::key_exists(&key));
                }
                let existing = table.get_raw(&key)?;
                let merged = merge_rows(existing, self.to_row()?);
                table.update_row(&key, merged)?
            }
            None => {
                let name = self.core().name.clone();
                if repo.name_is_free(&name) {
                    table.insert_row(self.to_row()?)?
                } else if modify {
                    // Upsert: merge this draft into the same-kind row
                    // holding the name. A cross-kind collision is an error.
                    let existing_key = repo.resolve_key(name.as_str())?;
                    let existing = table
                        .get_raw(&existing_key)
                        .map_err(|_| Error::name_exists(&name))?;
                    let merged = merge_rows(existing, self.to_row()?);
                    table.update_row(&existing_key, merged)?
                } else {
                    return Err(Error::name_exists(&name));
                }
            }
        };

        self.core_mut().key = saved.core().key.clone();
        Ok(saved)
    }

    /// Change this record's name, keeping its primary key.
    ///
    /// Only saved records can be renamed; a draft's name is plain data
    /// until the first save.
    fn rename(&mut self, new_name: &str) -> Result<()> {
        let key = self.core().key.clone().ok_or_else(|| {
            Error::InvalidRecordState(format!("rename_before_save:{}", self.core().name))
        })?;
        self.table().rename(&key, new_name)?;
        self.core_mut().name = new_name.to_string();
        Ok(())
    }

    /// Delete this record's row. Consumes the handle.
    fn atomic_delete(self) -> Result<()> {
        match self.core().key.clone() {
            Some(key) => self.table().remove(key),
            None => Err(Error::NoSuchRecord(self.core().name.clone())),
        }
    }

    /// The row form, as it would be stored.
    fn raw(&self) -> Result<Value> {
        self.to_row()
    }
}

/// Merge an incoming row into a stored row.
///
/// Incoming fields win. A null incoming `primary_key` is skipped so an
/// unsaved draft cannot clobber the stored identity. When both sides hold
/// an object under the same field, the objects are merged one level deep;
/// everything else is replaced wholesale.
pub(crate) fn merge_rows(mut base: Value, incoming: Value) -> Value {
    let Value::Object(incoming) = incoming else {
        return base;
    };
    let Some(base_map) = base.as_object_mut() else {
        return base;
    };
    for (field, value) in incoming {
        if field == "primary_key" && value.is_null() {
            continue;
        }
        let merged_in_place = match (base_map.get_mut(&field), &value) {
            (Some(Value::Object(slot)), Value::Object(patch)) => {
                for (k, v) in patch {
                    slot.insert(k.clone(), v.clone());
                }
                true
            }
            _ => false,
        };
        if !merged_in_place {
            base_map.insert(field, value);
        }
    }
    base
}
