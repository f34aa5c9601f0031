//! Core types for the Specimen record store
//!
//! This crate defines the foundational vocabulary shared by the storage
//! backend and the record engine:
//! - [`RecordKey`]: opaque, generated primary keys
//! - [`KindTag`]: discriminator for the four record kinds
//! - [`RecordRef`]: caller-supplied token (name, key, or attached handle)
//! - [`ResultSchema`]: declared shape of a result's file collection
//! - [`Error`] / [`Result`]: the canonical error taxonomy

pub mod error;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
pub use schema::{FileCollection, ResultSchema};
pub use types::{KindTag, Metadata, RecordKey, RecordRef, Status};
