//! The four record kinds
//!
//! - [`FileRecord`]: a file on disk, fingerprinted by a prefix checksum
//! - [`ResultRecord`]: a computed result owning a schema-shaped
//!   collection of file records
//! - [`SampleRecord`]: a physical sample grouping results
//! - [`SampleGroupRecord`]: a recursive grouping of samples, results,
//!   and subgroups
//!
//! References between kinds are stored as primary keys, resolved at
//! construction time so rows never hold names.

mod file;
mod group;
mod result;
mod sample;

pub use file::FileRecord;
pub use group::{GroupTree, SampleGroupRecord};
pub use result::ResultRecord;
pub use sample::SampleRecord;
