//! File records: files on disk tracked by relative path and checksum
//!
//! Paths are stored relative to the repo base so the whole store can be
//! relocated. The checksum covers only a configurable prefix of the file
//! (default 4 KiB); it is a freshness probe, not an integrity proof.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specimen_core::{Error, KindTag, Metadata, Result, Status};
use specimen_storage::fsio;
use std::path::{Path, PathBuf};

use crate::record::{Record, RecordCore};
use crate::repo::Repo;

/// A tracked file on disk
#[derive(Debug, Clone)]
pub struct FileRecord {
    core: RecordCore,
    rel_path: PathBuf,
    file_type: String,
    checksum: String,
}

#[derive(Serialize, Deserialize)]
struct FileRow {
    primary_key: Option<String>,
    name: String,
    #[serde(default)]
    metadata: Metadata,
    rel_path: PathBuf,
    file_type: String,
    checksum: String,
}

impl FileRecord {
    /// Track the file at `filepath` under a registered file type.
    ///
    /// The file must already exist: its checksum is computed here.
    /// Absolute paths must point inside the repo base directory.
    pub fn new(repo: &Repo, name: &str, filepath: &Path, file_type: &str) -> Result<Self> {
        let file_type = repo.validate_file_type(file_type)?;
        let rel_path = repo.rel_path(filepath)?;
        let abs = repo.abs_path(&rel_path);
        let checksum = fsio::prefix_digest(&abs, repo.config().checksum_prefix_len)?;
        Ok(FileRecord {
            core: RecordCore::new(repo, name),
            rel_path,
            file_type,
            checksum,
        })
    }

    /// Path relative to the repo base.
    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    /// Absolute path, resolved against the repo base.
    pub fn path(&self) -> PathBuf {
        self.core.repo.abs_path(&self.rel_path)
    }

    /// Registered file type of this file.
    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Stored prefix checksum.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Move the underlying file to `dest` and retarget the record.
    ///
    /// Refuses to overwrite an existing destination. The stored row is
    /// updated when the record is saved.
    pub fn move_to(&mut self, dest: &Path) -> Result<()> {
        self.core.repo.ensure_writable()?;
        let rel_dest = self.core.repo.rel_path(dest)?;
        let abs_dest = self.core.repo.abs_path(&rel_dest);
        fsio::move_file(&self.path(), &abs_dest)?;
        self.rel_path = rel_dest;
        self.core.status = OnceCell::new();
        if self.is_saved() {
            self.save(true)?;
        }
        Ok(())
    }

    /// Copy the underlying file to `dest`, leaving the record unchanged.
    pub fn copy_to(&self, dest: &Path) -> Result<()> {
        let rel_dest = self.core.repo.rel_path(dest)?;
        let abs_dest = self.core.repo.abs_path(&rel_dest);
        fsio::copy_file(&self.path(), &abs_dest)
    }
}

impl Record for FileRecord {
    const KIND: KindTag = KindTag::File;

    fn from_row(repo: &Repo, row: Value) -> Result<Self> {
        let row: FileRow = serde_json::from_value(row)?;
        Ok(FileRecord {
            core: RecordCore::from_stored(repo, row.primary_key, row.name, row.metadata),
            rel_path: row.rel_path,
            file_type: row.file_type,
            checksum: row.checksum,
        })
    }

    fn to_row(&self) -> Result<Value> {
        let row = FileRow {
            primary_key: self.core.key.as_ref().map(|k| k.as_str().to_string()),
            name: self.core.name.clone(),
            metadata: self.core.metadata.clone(),
            rel_path: self.rel_path.clone(),
            file_type: self.file_type.clone(),
            checksum: self.checksum.clone(),
        };
        serde_json::to_value(row).map_err(Error::from)
    }

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn compute_status(&self) -> Status {
        let abs = self.path();
        if !abs.is_file() {
            return Status::fail(format!("file_missing:{}", self.rel_path.display()));
        }
        let prefix_len = self.core.repo.config().checksum_prefix_len;
        match fsio::prefix_digest(&abs, prefix_len) {
            Ok(digest) if digest == self.checksum => Status::all_good(),
            Ok(_) => Status::fail(format!("checksum_mismatch:{}", self.rel_path.display())),
            Err(e) => Status::fail(format!("checksum_unreadable:{e}")),
        }
    }
}
