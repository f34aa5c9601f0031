//! Repo metadata side file
//!
//! Holds the generated store identifier and creation timestamp. Created on
//! first access and cached by the repo handle thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use specimen_core::{Error, Result};
use std::path::Path;
use uuid::Uuid;

use crate::fsio;

/// Store-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMeta {
    /// Generated identifier for this store
    pub store_id: Uuid,
    /// Creation time of the metadata file
    pub created_at: DateTime<Utc>,
}

impl RepoMeta {
    /// Load the metadata file, generating it on first access.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            return toml::from_str(&text)
                .map_err(|e| Error::Serialization(format!("repo meta {path:?}: {e}")));
        }
        let meta = RepoMeta {
            store_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let text = toml::to_string_pretty(&meta)
            .map_err(|e| Error::Serialization(format!("repo meta {path:?}: {e}")))?;
        fsio::atomic_write(path, text.as_bytes())?;
        Ok(meta)
    }
}
