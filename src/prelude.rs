//! Convenience re-exports for common usage.
//!
//! ```ignore
//! use specimen::prelude::*;
//! ```

pub use crate::record::Record;
pub use crate::records::{FileRecord, ResultRecord, SampleGroupRecord, SampleRecord};
pub use crate::repo::{Repo, RepoConfig};
pub use specimen_core::{
    Error, FileCollection, RecordKey, RecordRef, Result, ResultSchema, Status,
};
