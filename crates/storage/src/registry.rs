//! TOML side registries
//!
//! Three small registries live beside the document store:
//!
//! - sample types: a set of tags
//! - file types: tag → file extension
//! - result schemas: tag → [`ResultSchema`]
//!
//! Each is loaded once at repo open and written through on every
//! mutation. [`SideRegistry`] is the shared codec; the wrapper structs
//! define the file shapes.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use specimen_core::{Error, Result, ResultSchema};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::fsio;

/// Registered sample-type tags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleTypes {
    /// The tag set
    #[serde(default)]
    pub types: BTreeSet<String>,
}

/// Registered file types: tag → extension
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileTypes {
    /// tag → extension map
    #[serde(default)]
    pub types: BTreeMap<String, String>,
}

/// Registered result schemas: tag → shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSchemas {
    /// tag → schema map
    #[serde(default)]
    pub schemas: BTreeMap<String, ResultSchema>,
}

/// A TOML side file holding one registry
pub struct SideRegistry<T> {
    path: PathBuf,
    data: RwLock<T>,
}

impl<T: Default + Clone + Serialize + DeserializeOwned> SideRegistry<T> {
    /// Load the registry, starting empty when the file is absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            toml::from_str(&text)
                .map_err(|e| Error::Serialization(format!("registry {path:?}: {e}")))?
        } else {
            T::default()
        };
        Ok(SideRegistry {
            path,
            data: RwLock::new(data),
        })
    }

    /// Read-only access.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.data.read())
    }

    /// Mutate and write through.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut data = self.data.write();
        let out = f(&mut data);
        let text = toml::to_string_pretty(&*data)
            .map_err(|e| Error::Serialization(format!("registry {:?}: {e}", self.path)))?;
        fsio::atomic_write(&self.path, text.as_bytes())?;
        Ok(out)
    }
}
