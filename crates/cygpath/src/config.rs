//! Decorator configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_TOOL_NAME: &str = "cygpath";
/// HKLM key recording where the Cygwin root mount points.
pub const DEFAULT_REGISTRY_KEY: &str = r"SOFTWARE\Cygnus Solutions\Cygwin\mounts v2\/";
pub const DEFAULT_REGISTRY_VALUE: &str = "native";
pub const DEFAULT_TOOL_RELATIVE_PATH: &str = r"bin\cygpath";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cygpath config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cygpath config field `{0}` must not be empty")]
    Empty(&'static str),
}

/// Where the translation tool lives and how to find it on a worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CygpathConfig {
    /// Tool invoked when launching on the local node, resolved through PATH.
    pub tool_name: String,
    /// Key under HKEY_LOCAL_MACHINE holding the Cygwin root mount.
    pub registry_key: String,
    /// Value under `registry_key` naming the native root directory.
    pub registry_value: String,
    /// Tool location relative to the Cygwin root, Windows separators.
    pub tool_relative_path: String,
}

impl Default for CygpathConfig {
    fn default() -> Self {
        Self {
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            registry_key: DEFAULT_REGISTRY_KEY.to_string(),
            registry_value: DEFAULT_REGISTRY_VALUE.to_string(),
            tool_relative_path: DEFAULT_TOOL_RELATIVE_PATH.to_string(),
        }
    }
}

impl CygpathConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("tool_name", &self.tool_name),
            ("registry_key", &self.registry_key),
            ("registry_value", &self.registry_value),
            ("tool_relative_path", &self.tool_relative_path),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }
        Ok(())
    }
}
