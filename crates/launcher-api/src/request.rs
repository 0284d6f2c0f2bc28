use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Replacement shown for masked arguments.
pub const MASK_PLACEHOLDER: &str = "********";

/// In-memory sink for a child's output. Clones share the same bytes.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&self, bytes: &[u8]) {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(bytes);
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().map(|buf| buf.clone()).unwrap_or_default()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.0.lock().map(|buf| buf.len()).unwrap_or(0);
        f.debug_struct("SharedBuffer").field("len", &len).finish()
    }
}

/// Where a child's output stream goes.
#[derive(Clone, Debug, Default)]
pub enum StreamTarget {
    #[default]
    Inherit,
    Null,
    Buffer(SharedBuffer),
}

/// Everything a launcher needs to start one process.
///
/// Fields are public so decorators can edit a copy before delegating;
/// `clone()` is the copy operation.
#[derive(Clone, Debug, Default)]
pub struct LaunchRequest {
    /// Command vector; element 0 is the executable.
    pub cmds: Vec<String>,
    /// Per-argument redaction flags, index-aligned with `cmds`. Empty means
    /// nothing is masked.
    pub masks: Vec<bool>,
    /// Environment overlay applied on top of the launcher's own environment.
    pub envs: BTreeMap<String, String>,
    pub pwd: Option<PathBuf>,
    pub stdout: StreamTarget,
    pub stderr: StreamTarget,
}

impl LaunchRequest {
    pub fn new<I, S>(cmds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmds: cmds.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn masks(mut self, masks: Vec<bool>) -> Self {
        self.masks = masks;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, envs: BTreeMap<String, String>) -> Self {
        self.envs.extend(envs);
        self
    }

    pub fn pwd(mut self, pwd: impl Into<PathBuf>) -> Self {
        self.pwd = Some(pwd.into());
        self
    }

    pub fn stdout(mut self, target: StreamTarget) -> Self {
        self.stdout = target;
        self
    }

    pub fn stderr(mut self, target: StreamTarget) -> Self {
        self.stderr = target;
        self
    }

    pub fn executable(&self) -> Option<&str> {
        self.cmds.first().map(String::as_str)
    }

    pub fn is_masked(&self, index: usize) -> bool {
        self.masks.get(index).copied().unwrap_or(false)
    }

    /// Command vector with masked arguments hidden, for logs.
    pub fn display_cmds(&self) -> String {
        self.cmds
            .iter()
            .enumerate()
            .map(|(idx, arg)| {
                if self.is_masked(idx) {
                    MASK_PLACEHOLDER
                } else {
                    arg.as_str()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
