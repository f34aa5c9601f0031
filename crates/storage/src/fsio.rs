//! Filesystem primitives
//!
//! - [`prefix_digest`]: SHA-256 over the leading bytes of a file. This is a
//!   partial fingerprint used as a cheap freshness probe, not a full-file
//!   hash; the prefix length is chosen by the caller.
//! - [`atomic_write`]: temp file + rename replace.
//! - [`copy_file`] / [`move_file`]: guarded relocation used by file
//!   records. Copy refuses to overwrite and creates intermediate
//!   directories; move falls back to copy + remove across filesystems.

use sha2::{Digest, Sha256};
use specimen_core::{Error, Result};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Hex digest of the first `prefix_len` bytes of the file at `path`.
///
/// Files shorter than the prefix hash whatever bytes exist.
pub fn prefix_digest(path: &Path, prefix_len: usize) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut buf = vec![0u8; prefix_len];
    let mut filled = 0;
    while filled < prefix_len {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let mut hasher = Sha256::new();
    hasher.update(&buf[..filled]);
    let digest = hasher.finalize();

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    Ok(out)
}

/// Write `bytes` to `path` atomically via a temp file and rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = path.with_extension("tmp");
    fs::write(&temp, bytes)?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// Copy `src` to `dst`, creating intermediate directories.
///
/// Refuses to overwrite an existing destination.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination exists: {}", dst.display()),
        )));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Move `src` to `dst`, creating intermediate directories.
///
/// Tries a rename first and falls back to copy + remove when the
/// destination is on another filesystem.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination exists: {}", dst.display()),
        )));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dst)?;
            fs::remove_file(src)?;
            Ok(())
        }
    }
}
