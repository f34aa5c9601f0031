//! Foundational types for the record store
//!
//! This module defines:
//! - RecordKey: opaque primary key, generated at first insert
//! - KindTag: discriminator for the four record kinds
//! - RecordRef: caller-supplied token resolved by the identity index
//! - Status: the (valid, diagnostic) pair produced by validity checks

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a generated primary key
pub const KEY_LEN: usize = 20;

/// Alphabet used for generated primary keys
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Diagnostic message reported by a record that passed every check
pub const ALL_GOOD: &str = "all_good";

/// Free-form, string-keyed metadata attached to every record
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Opaque primary key for a record
///
/// Keys are globally unique across all record kinds, immutable once
/// assigned, and generated at first successful insert. Callers never
/// supply one for a genuinely new record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Wrap an existing key string loaded from storage.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a fresh random candidate key.
    ///
    /// Uniqueness is NOT guaranteed here; the caller must collision-check
    /// against the identity index before committing.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let key: String = (0..KEY_LEN)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect();
        Self(key)
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RecordKey> for String {
    fn from(key: RecordKey) -> Self {
        key.0
    }
}

/// Discriminator for the four record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    /// Raw file on disk
    File,
    /// Computed result grouping one or more files
    Result,
    /// Physical sample grouping results
    Sample,
    /// Group of samples, results, and subgroups
    SampleGroup,
}

impl KindTag {
    /// Name of the backing collection for this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            KindTag::File => "file_records",
            KindTag::Result => "result_records",
            KindTag::Sample => "sample_records",
            KindTag::SampleGroup => "sample_group_records",
        }
    }

    /// All kinds, in identity-index scan order.
    pub fn all() -> [KindTag; 4] {
        [
            KindTag::File,
            KindTag::Result,
            KindTag::Sample,
            KindTag::SampleGroup,
        ]
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KindTag::File => "file",
            KindTag::Result => "result",
            KindTag::Sample => "sample",
            KindTag::SampleGroup => "sample_group",
        };
        f.write_str(s)
    }
}

/// Caller-supplied token identifying a record
///
/// The identity index resolves a `Token` by checking names first, then
/// keys. A `Key` variant carries the primary key attached to a record
/// handle and is trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    /// An ambiguous string: either a name or a key, resolved name-first
    Token(String),
    /// A key taken from a record handle
    Key(RecordKey),
}

impl RecordRef {
    /// Rendering for diagnostics.
    pub fn describe(&self) -> &str {
        match self {
            RecordRef::Token(s) => s,
            RecordRef::Key(k) => k.as_str(),
        }
    }
}

impl From<&str> for RecordRef {
    fn from(s: &str) -> Self {
        RecordRef::Token(s.to_string())
    }
}

impl From<String> for RecordRef {
    fn from(s: String) -> Self {
        RecordRef::Token(s)
    }
}

impl From<&String> for RecordRef {
    fn from(s: &String) -> Self {
        RecordRef::Token(s.clone())
    }
}

impl From<RecordKey> for RecordRef {
    fn from(k: RecordKey) -> Self {
        RecordRef::Key(k)
    }
}

impl From<&RecordKey> for RecordRef {
    fn from(k: &RecordKey) -> Self {
        RecordRef::Key(k.clone())
    }
}

/// Outcome of a validity check: a flag plus a diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Whether the record passed every check
    pub ok: bool,
    /// `all_good` on success, otherwise a diagnostic
    pub message: String,
}

impl Status {
    /// A passing status.
    pub fn all_good() -> Self {
        Status {
            ok: true,
            message: ALL_GOOD.to_string(),
        }
    }

    /// A failing status with a diagnostic.
    pub fn fail(message: impl Into<String>) -> Self {
        Status {
            ok: false,
            message: message.into(),
        }
    }
}
