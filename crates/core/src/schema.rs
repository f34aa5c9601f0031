//! Result schemas: declared shapes for a result's file collection
//!
//! Each result type registers one [`ResultSchema`]. A schema is a tagged
//! variant with three cases, each carrying its own validation rule:
//!
//! - `List`: fixed-arity ordered list of file types
//! - `Map`: fixed key-set, each key naming a file type
//! - `Scalar`: a single opaque file reference
//!
//! Schemas are mutable at the store level. A result built under one schema
//! version becomes invalid if the schema is later changed incompatibly;
//! this is intentional drift detection.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared shape of a result type's file collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSchema {
    /// Fixed-arity ordered list; each entry is a file-type tag
    List(Vec<String>),
    /// Fixed key-set map; each key names a file-type tag
    Map(BTreeMap<String, String>),
    /// A single opaque file reference tagged with one file type
    Scalar(String),
}

/// A schema-shaped collection of file-record keys
///
/// Serialized untagged so that rows store a plain JSON array, object, or
/// string, matching the schema shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileCollection {
    /// Positional file keys (list schema)
    List(Vec<String>),
    /// Keyed file keys (map schema)
    Map(BTreeMap<String, String>),
    /// Single file key (scalar schema)
    Scalar(String),
}

impl FileCollection {
    /// All file keys held by this collection, in deterministic order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            FileCollection::List(v) => v.iter().map(String::as_str).collect(),
            FileCollection::Map(m) => m.values().map(String::as_str).collect(),
            FileCollection::Scalar(k) => vec![k.as_str()],
        }
    }

    /// Number of file references held.
    pub fn len(&self) -> usize {
        match self {
            FileCollection::List(v) => v.len(),
            FileCollection::Map(m) => m.len(),
            FileCollection::Scalar(_) => 1,
        }
    }

    /// True when no file references are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for FileCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileCollection::List(v) => write!(f, "list[{}]", v.len()),
            FileCollection::Map(m) => {
                let keys: Vec<_> = m.keys().map(String::as_str).collect();
                write!(f, "map{{{}}}", keys.join(", "))
            }
            FileCollection::Scalar(_) => write!(f, "scalar"),
        }
    }
}

impl fmt::Display for ResultSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultSchema::List(v) => write!(f, "list[{}]", v.len()),
            ResultSchema::Map(m) => {
                let keys: Vec<_> = m.keys().map(String::as_str).collect();
                write!(f, "map{{{}}}", keys.join(", "))
            }
            ResultSchema::Scalar(t) => write!(f, "scalar({t})"),
        }
    }
}

impl ResultSchema {
    /// Shape a draft collection to this schema.
    ///
    /// - List: the given collection must be a list of exactly the declared
    ///   arity; anything else is a [`Error::SchemaMismatch`].
    /// - Map: the given collection must be a map. Unknown keys are silently
    ///   dropped, unless `strict` is set, in which case an unknown key is a
    ///   hard failure. Missing keys are allowed here; validity checking
    ///   rejects incomplete maps later.
    /// - Scalar: the given collection must be a single reference.
    pub fn conform(
        &self,
        given: FileCollection,
        strict: bool,
        result_type: &str,
        key: Option<&str>,
    ) -> Result<FileCollection> {
        let mismatch = |value: &FileCollection| Error::SchemaMismatch {
            result_type: result_type.to_string(),
            key: key.map(str::to_string),
            schema: self.to_string(),
            value: value.to_string(),
        };

        match (self, given) {
            (ResultSchema::List(declared), FileCollection::List(files)) => {
                if files.len() != declared.len() {
                    return Err(mismatch(&FileCollection::List(files)));
                }
                Ok(FileCollection::List(files))
            }
            (ResultSchema::Map(declared), FileCollection::Map(files)) => {
                if strict && files.keys().any(|k| !declared.contains_key(k)) {
                    return Err(mismatch(&FileCollection::Map(files)));
                }
                let kept = files
                    .into_iter()
                    .filter(|(k, _)| declared.contains_key(k))
                    .collect();
                Ok(FileCollection::Map(kept))
            }
            (ResultSchema::Scalar(_), FileCollection::Scalar(file)) => {
                Ok(FileCollection::Scalar(file))
            }
            (_, given) => Err(mismatch(&given)),
        }
    }

    /// Check that a stored collection still matches this schema's shape.
    ///
    /// Used by validity checking: list arity must be exact, a map's key-set
    /// must equal the declared key-set, a scalar must be a scalar. Returns
    /// a diagnostic on drift.
    pub fn check_shape(&self, collection: &FileCollection) -> std::result::Result<(), String> {
        match (self, collection) {
            (ResultSchema::List(declared), FileCollection::List(files)) => {
                if files.len() != declared.len() {
                    return Err(format!(
                        "schema_drift:arity {} != {}",
                        files.len(),
                        declared.len()
                    ));
                }
                Ok(())
            }
            (ResultSchema::Map(declared), FileCollection::Map(files)) => {
                let declared_keys: Vec<_> = declared.keys().collect();
                let got_keys: Vec<_> = files.keys().collect();
                if declared_keys != got_keys {
                    return Err(format!(
                        "schema_drift:keys [{}] != [{}]",
                        got_keys
                            .iter()
                            .map(|s| s.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                        declared_keys
                            .iter()
                            .map(|s| s.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                }
                Ok(())
            }
            (ResultSchema::Scalar(_), FileCollection::Scalar(_)) => Ok(()),
            (schema, collection) => Err(format!("schema_drift:{collection} != {schema}")),
        }
    }
}
