//! Read-only registry lookups.
//!
//! [`RegistryReader`] opens keys and [`RegistryKey`] reads string values from
//! them. Dropping a key releases the underlying handle, so callers that hold a
//! key only for the duration of one lookup never leak it, whichever way the
//! lookup ends.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(windows)]
mod windows_impl;

#[cfg(windows)]
pub use windows_impl::WindowsRegistry;

/// Registry root a key path is resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
}

impl Hive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalMachine => "HKEY_LOCAL_MACHINE",
            Self::CurrentUser => "HKEY_CURRENT_USER",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry key {hive}\\{path} not found")]
    KeyNotFound { hive: Hive, path: String },

    #[error("registry value {name:?} not found under {path}")]
    ValueNotFound { path: String, name: String },

    #[error("registry access to {path} failed with code {code}")]
    Access { path: String, code: u32 },

    #[error("registry value {name:?} under {path} is not a string")]
    InvalidData { path: String, name: String },

    #[error("registry is not available on this platform")]
    Unsupported,
}

/// An open, read-only key. Dropping it releases the handle.
pub trait RegistryKey {
    fn path(&self) -> &str;

    fn string_value(&self, name: &str) -> Result<String, RegistryError>;
}

pub trait RegistryReader: Send + Sync {
    fn open_readonly(&self, hive: Hive, path: &str) -> Result<Box<dyn RegistryKey>, RegistryError>;

    /// Open `path`, read `name`, and release the key.
    fn string_value(&self, hive: Hive, path: &str, name: &str) -> Result<String, RegistryError> {
        let key = self.open_readonly(hive, path)?;
        key.string_value(name)
    }
}

/// Registry of the host this process runs on.
pub fn system_registry() -> Arc<dyn RegistryReader> {
    #[cfg(windows)]
    {
        Arc::new(WindowsRegistry)
    }

    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedRegistry)
    }
}

/// Reader for hosts without a registry; every open fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnsupportedRegistry;

impl RegistryReader for UnsupportedRegistry {
    fn open_readonly(&self, _hive: Hive, _path: &str) -> Result<Box<dyn RegistryKey>, RegistryError> {
        Err(RegistryError::Unsupported)
    }
}

/// In-memory registry, keyed by hive and exact key path.
#[derive(Clone, Debug, Default)]
pub struct StaticRegistry {
    keys: HashMap<(Hive, String), HashMap<String, String>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(
        mut self,
        hive: Hive,
        path: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.keys
            .entry((hive, path.into()))
            .or_default()
            .insert(name.into(), value.into());
        self
    }
}

struct StaticKey {
    path: String,
    values: HashMap<String, String>,
}

impl RegistryKey for StaticKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn string_value(&self, name: &str) -> Result<String, RegistryError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ValueNotFound {
                path: self.path.clone(),
                name: name.to_string(),
            })
    }
}

impl RegistryReader for StaticRegistry {
    fn open_readonly(&self, hive: Hive, path: &str) -> Result<Box<dyn RegistryKey>, RegistryError> {
        let values = self
            .keys
            .get(&(hive, path.to_string()))
            .ok_or_else(|| RegistryError::KeyNotFound {
                hive,
                path: path.to_string(),
            })?;
        tracing::trace!(target: "win_registry", %hive, path, "opened static key");
        Ok(Box::new(StaticKey {
            path: path.to_string(),
            values: values.clone(),
        }))
    }
}
