//! # Specimen
//!
//! Embedded record store for hierarchical scientific-data artifacts.
//!
//! Specimen tracks four kinds of records — raw files, computed results,
//! samples, and sample groups — in a single relocatable store directory.
//! Records reference each other by opaque primary key, forming a DAG
//! rooted at sample groups, and a recursive consistency checker walks
//! that DAG to report validity.
//!
//! ## Quick Start
//!
//! ```ignore
//! use specimen::prelude::*;
//!
//! // Initialize a store and register types inside a writable session
//! let repo = Repo::init("./project")?;
//! repo.with_write(|repo| {
//!     repo.add_sample_type("stool")?;
//!     repo.add_file_type("fastq")?;
//!     repo.add_result_schema(
//!         "reads",
//!         ResultSchema::List(vec!["fastq".into(), "fastq".into()]),
//!     )?;
//!
//!     let mut file = FileRecord::new(repo, "r1", "reads/r1.fq".as_ref(), "fastq")?;
//!     file.save(false)?;
//!     Ok(())
//! })?;
//!
//! // Reads never need a session
//! let file = repo.files().get("r1")?;
//! assert!(file.valid_status());
//! ```
//!
//! ## Design
//!
//! - The store is read-only by default; [`Repo::with_write`] opens a
//!   scoped writable session that restores the prior state and flushes
//!   pending writes on every exit path.
//! - Names and primary keys are globally unique across all kinds; the
//!   identity index resolves either (names take precedence).
//! - Validity status is computed lazily and memoized per record
//!   instance.

#![warn(missing_docs)]

mod identity;
mod record;
mod repo;
mod table;

pub mod prelude;
pub mod records;

pub use record::{Record, RecordCore};
pub use records::{
    FileRecord, GroupTree, ResultRecord, SampleGroupRecord, SampleRecord,
};
pub use repo::{Repo, RepoConfig, RepoStatus};
pub use table::Table;

// Re-export the core vocabulary
pub use specimen_core::{
    Error, FileCollection, KindTag, Metadata, RecordKey, RecordRef, Result, ResultSchema, Status,
};
