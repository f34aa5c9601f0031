//! Identity index: global name ↔ key resolution
//!
//! One bidirectional map spans all four record tables, enforcing global
//! uniqueness of both names and primary keys. The index is built lazily
//! by a single scan of every table and maintained incrementally
//! afterwards: inserts add both mappings, renames swap the name mapping,
//! removals delete both mappings.
//!
//! Token precedence in [`IdentityIndex::resolve_key`] is name first, then
//! key, then the key attached to a record handle. A record whose name
//! happens to equal another record's key therefore shadows that key; this
//! ordering is deliberate and load-bearing for compatibility.

use serde_json::Value;
use specimen_core::{Error, KindTag, RecordKey, RecordRef, Result};
use std::collections::HashMap;
use tracing::debug;

pub(crate) struct IdentityIndex {
    key_to_name: HashMap<String, String>,
    name_to_key: HashMap<String, String>,
}

impl IdentityIndex {
    /// Build the index by scanning every table's raw rows once.
    ///
    /// Rows missing a key or name are skipped; the bulk-repair paths deal
    /// with them.
    pub(crate) fn build(rows_for: impl Fn(KindTag) -> Vec<Value>) -> Self {
        let mut index = IdentityIndex {
            key_to_name: HashMap::new(),
            name_to_key: HashMap::new(),
        };
        for kind in KindTag::all() {
            for row in rows_for(kind) {
                let key = row.get("primary_key").and_then(Value::as_str);
                let name = row.get("name").and_then(Value::as_str);
                if let (Some(key), Some(name)) = (key, name) {
                    index.register(key, name);
                }
            }
        }
        debug!(
            target: "specimen::identity",
            entries = index.key_to_name.len(),
            "identity index built"
        );
        index
    }

    /// Resolve a token to the canonical primary key.
    ///
    /// Precedence: name, then key, then attached handle.
    pub(crate) fn resolve_key(&self, token: &RecordRef) -> Result<RecordKey> {
        match token {
            RecordRef::Token(s) => {
                if let Some(key) = self.name_to_key.get(s) {
                    return Ok(RecordKey::new(key.clone()));
                }
                if self.key_to_name.contains_key(s) {
                    return Ok(RecordKey::new(s.clone()));
                }
                Err(Error::NoSuchRecord(s.clone()))
            }
            // A key taken from a record handle is trusted as-is.
            RecordRef::Key(key) => Ok(key.clone()),
        }
    }

    /// Resolve a token to the human-readable name.
    pub(crate) fn resolve_name(&self, token: &RecordRef) -> Result<String> {
        match token {
            RecordRef::Token(s) => {
                if let Some(name) = self.key_to_name.get(s) {
                    return Ok(name.clone());
                }
                // The token may already be a name.
                if self.name_to_key.contains_key(s) {
                    return Ok(s.clone());
                }
                Err(Error::NoSuchRecord(s.clone()))
            }
            RecordRef::Key(key) => self
                .key_to_name
                .get(key.as_str())
                .cloned()
                .ok_or_else(|| Error::NoSuchRecord(key.to_string())),
        }
    }

    pub(crate) fn key_is_free(&self, key: &str) -> bool {
        !self.key_to_name.contains_key(key)
    }

    pub(crate) fn name_is_free(&self, name: &str) -> bool {
        !self.name_to_key.contains_key(name)
    }

    /// Record both mappings for a newly inserted row.
    pub(crate) fn register(&mut self, key: &str, name: &str) {
        self.key_to_name.insert(key.to_string(), name.to_string());
        self.name_to_key.insert(name.to_string(), key.to_string());
    }

    /// Swap the name mapping for a rename. Both sides or neither.
    pub(crate) fn rename(&mut self, key: &str, old_name: &str, new_name: &str) {
        self.name_to_key.remove(old_name);
        self.name_to_key
            .insert(new_name.to_string(), key.to_string());
        self.key_to_name.insert(key.to_string(), new_name.to_string());
    }

    /// Delete both mappings for a removed row.
    pub(crate) fn unregister(&mut self, key: &str, name: &str) {
        self.key_to_name.remove(key);
        self.name_to_key.remove(name);
    }
}
