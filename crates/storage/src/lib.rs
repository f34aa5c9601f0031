//! Storage backend for the Specimen record store
//!
//! Three concerns live here, all beneath the record engine:
//!
//! - [`DocStore`]: a JSON-file-backed structured document store with
//!   table-scoped insert/update/remove/query-by-field and stable row
//!   identity. Writes are buffered in memory and flushed atomically
//!   (temp file + rename).
//! - [`SideRegistry`]: small TOML side files for the type registries and
//!   repo metadata, written through on every mutation.
//! - [`fsio`]: filesystem primitives — prefix digests, guarded copy/move,
//!   atomic replace.
//!
//! Nothing in this crate knows about record semantics; read-only
//! enforcement and identity bookkeeping happen a layer up.

pub mod doc_store;
pub mod fsio;
pub mod meta;
pub mod registry;

pub use doc_store::{DocStore, RowId};
pub use meta::RepoMeta;
pub use registry::{FileTypes, ResultSchemas, SampleTypes, SideRegistry};
