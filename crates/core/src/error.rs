//! Error types for the Specimen record store
//!
//! One canonical error enum for the whole system. We use `thiserror` for
//! automatic `Display` and `Error` trait implementations.
//!
//! Identity and I/O failures propagate to the caller by default. The two
//! bulk-scan paths (`invalid_keys`/`remove_invalids` and `check_status`)
//! convert per-row errors into negative per-row results instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Specimen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Specimen record store
#[derive(Debug, Error)]
pub enum Error {
    /// Identity collision on create, keyed by primary key or by name
    #[error("record exists: {0}")]
    RecordExists(String),

    /// Lookup miss: no record matches the given token
    #[error("no such record: {0}")]
    NoSuchRecord(String),

    /// A record failed its validity check; carries the diagnostic
    #[error("invalid record state: {0}")]
    InvalidRecordState(String),

    /// Mutation attempted outside a writable session
    #[error("repo is read-only")]
    RepoReadOnly,

    /// A type tag was referenced that has never been registered
    #[error("type not registered: {0}")]
    TypeNotFound(String),

    /// A result's file collection disagrees with its registered schema
    #[error(
        "schema mismatch for result type {result_type} (key {key:?}): \
         schema {schema}, value {value}"
    )]
    SchemaMismatch {
        /// The declared result type
        result_type: String,
        /// Primary key of the offending record, if assigned
        key: Option<String>,
        /// Rendering of the registered schema
        schema: String,
        /// Rendering of the offending collection
        value: String,
    },

    /// No repo marker directory found at or above the starting path
    #[error("no repo found at or above {0}")]
    NoRepoFound(PathBuf),

    /// Repo initialization attempted where a repo already exists
    #[error("repo already exists at {0}")]
    RepoAlreadyExists(PathBuf),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage backend error
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Identity collision keyed by primary key.
    pub fn key_exists(key: impl std::fmt::Display) -> Self {
        Error::RecordExists(format!("pk_exists:{key}"))
    }

    /// Identity collision keyed by name.
    pub fn name_exists(name: impl std::fmt::Display) -> Self {
        Error::RecordExists(format!("name_exists:{name}"))
    }

    /// Check if this is a lookup miss.
    pub fn is_no_such_record(&self) -> bool {
        matches!(self, Error::NoSuchRecord(_))
    }

    /// Check if this is an identity collision.
    pub fn is_record_exists(&self) -> bool {
        matches!(self, Error::RecordExists(_))
    }

    /// Check if this is a read-only rejection.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Error::RepoReadOnly)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
