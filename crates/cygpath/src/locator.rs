//! Finding the cygpath executable for the node a launcher targets.
//!
//! On the local node the bare tool name is returned and PATH does the rest.
//! For a remote worker the answer has to come from the worker itself, since
//! the two machines share neither a filesystem nor a registry: one
//! [`LocateCygpath`] call goes over the channel and the worker reads its own
//! Cygwin root from the registry.

use crate::config::CygpathConfig;
use launcher_api::remote;
use launcher_api::{CallRegistry, LaunchError, RemoteCall, RemoteError, RemoteErrorKind, VirtualChannel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use win_registry::{Hive, RegistryError, RegistryReader};

/// Zero-argument call asking a worker for its cygpath location.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LocateCygpath;

impl RemoteCall for LocateCygpath {
    const NAME: &'static str = "cygpath.locate";
    type Output = String;
}

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("Failed to locate Cygwin installation. Is Cygwin installed?")]
    CygwinNotFound {
        #[source]
        source: RegistryError,
    },
}

impl From<LocateError> for RemoteError {
    fn from(err: LocateError) -> Self {
        match &err {
            LocateError::CygwinNotFound { source } => {
                RemoteError::new(RemoteErrorKind::Io, err.to_string()).with_cause(source)
            }
        }
    }
}

/// Resolves the translation tool for a launcher's channel.
#[derive(Clone, Debug)]
pub struct ToolLocator {
    tool_name: String,
}

impl ToolLocator {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }

    pub fn from_config(config: &CygpathConfig) -> Self {
        Self::new(config.tool_name.clone())
    }

    /// Tool to invoke: the configured name when `channel` is `None`, otherwise
    /// whatever the worker on the other end reports. A worker without Cygwin
    /// fails the call instead of producing a guess.
    pub fn locate(&self, channel: Option<&dyn VirtualChannel>) -> Result<String, LaunchError> {
        let Some(channel) = channel else {
            return Ok(self.tool_name.clone());
        };

        match remote::call(channel, &LocateCygpath) {
            Ok(path) => {
                debug!(target: "cygpath::locate", path = %path, "worker reported cygpath location");
                Ok(path)
            }
            Err(err) => {
                warn!(target: "cygpath::locate", error = %err, "worker could not locate cygpath");
                Err(err.into())
            }
        }
    }
}

/// Native directory the Cygwin root is mounted from.
pub fn cygwin_root(
    registry: &dyn RegistryReader,
    config: &CygpathConfig,
) -> Result<String, LocateError> {
    let not_found = |source| LocateError::CygwinNotFound { source };
    let key = registry
        .open_readonly(Hive::LocalMachine, &config.registry_key)
        .map_err(not_found)?;
    key.string_value(&config.registry_value).map_err(not_found)
}

/// Absolute path of cygpath on this (Windows) host.
pub fn cygpath_exe(
    registry: &dyn RegistryReader,
    config: &CygpathConfig,
) -> Result<String, LocateError> {
    let root = cygwin_root(registry, config)?;
    Ok(join_windows(&root, &config.tool_relative_path))
}

fn join_windows(root: &str, relative: &str) -> String {
    let root = root.trim_end_matches(['\\', '/']);
    let relative = relative.trim_start_matches(['\\', '/']);
    format!("{root}\\{relative}")
}

/// Install the worker-side handler for [`LocateCygpath`].
pub fn register_worker_calls(
    calls: &mut CallRegistry,
    registry: Arc<dyn RegistryReader>,
    config: CygpathConfig,
) {
    calls.register(move |_: LocateCygpath| {
        cygpath_exe(registry.as_ref(), &config).map_err(RemoteError::from)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REGISTRY_KEY;
    use launcher_api::LoopbackChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use win_registry::{RegistryKey, StaticRegistry};

    fn cygwin_registry(root: &str) -> StaticRegistry {
        StaticRegistry::new().with_value(Hive::LocalMachine, DEFAULT_REGISTRY_KEY, "native", root)
    }

    fn worker(registry: impl RegistryReader + 'static) -> LoopbackChannel {
        let mut calls = CallRegistry::new();
        register_worker_calls(&mut calls, Arc::new(registry), CygpathConfig::default());
        LoopbackChannel::new(calls)
    }

    #[test]
    fn local_node_uses_tool_name() {
        let locator = ToolLocator::new("cygpath");
        assert_eq!(locator.locate(None).unwrap(), "cygpath");
    }

    #[test]
    fn worker_registration_answers_locate_calls() {
        let mut calls = CallRegistry::new();
        assert!(!calls.contains(LocateCygpath::NAME));
        register_worker_calls(&mut calls, Arc::new(StaticRegistry::new()), CygpathConfig::default());
        assert!(calls.contains(LocateCygpath::NAME));
    }

    #[test]
    fn worker_joins_root_and_relative_path() {
        let channel = worker(cygwin_registry(r"C:\cygwin"));
        let path = ToolLocator::new("cygpath").locate(Some(&channel)).unwrap();
        assert_eq!(path, r"C:\cygwin\bin\cygpath");
    }

    #[test]
    fn trailing_separators_in_root_are_collapsed() {
        assert_eq!(join_windows(r"D:\cygwin64\", r"bin\cygpath"), r"D:\cygwin64\bin\cygpath");
        assert_eq!(join_windows(r"C:\", r"\bin\cygpath"), r"C:\bin\cygpath");
    }

    #[test]
    fn missing_installation_is_an_error_not_a_guess() {
        let channel = worker(StaticRegistry::new());
        let err = ToolLocator::new("cygpath")
            .locate(Some(&channel))
            .unwrap_err();

        let LaunchError::Remote(remote) = &err else {
            panic!("expected remote error, got {err:?}");
        };
        assert_eq!(remote.kind, RemoteErrorKind::Io);
        assert_eq!(
            remote.message,
            "Failed to locate Cygwin installation. Is Cygwin installed?"
        );
        let cause = remote.cause.as_deref().expect("registry cause attached");
        assert!(cause.contains("mounts v2"), "{cause}");
    }

    #[test]
    fn missing_value_is_reported_as_missing_installation() {
        let registry =
            StaticRegistry::new().with_value(Hive::LocalMachine, DEFAULT_REGISTRY_KEY, "flags", "10");
        let err = cygpath_exe(&registry, &CygpathConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            LocateError::CygwinNotFound {
                source: RegistryError::ValueNotFound { .. }
            }
        ));
    }

    struct CountingRegistry {
        inner: StaticRegistry,
        open: Arc<AtomicUsize>,
    }

    struct CountingKey {
        inner: Box<dyn RegistryKey>,
        open: Arc<AtomicUsize>,
    }

    impl RegistryKey for CountingKey {
        fn path(&self) -> &str {
            self.inner.path()
        }

        fn string_value(&self, name: &str) -> Result<String, RegistryError> {
            self.inner.string_value(name)
        }
    }

    impl Drop for CountingKey {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl RegistryReader for CountingRegistry {
        fn open_readonly(
            &self,
            hive: Hive,
            path: &str,
        ) -> Result<Box<dyn RegistryKey>, RegistryError> {
            let inner = self.inner.open_readonly(hive, path)?;
            self.open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingKey {
                inner,
                open: self.open.clone(),
            }))
        }
    }

    #[test]
    fn key_handle_is_released_on_success_and_failure() {
        let open = Arc::new(AtomicUsize::new(0));
        let config = CygpathConfig::default();

        let found = CountingRegistry {
            inner: cygwin_registry(r"C:\cygwin"),
            open: open.clone(),
        };
        assert!(cygpath_exe(&found, &config).is_ok());
        assert_eq!(open.load(Ordering::SeqCst), 0);

        let wrong_value = CountingRegistry {
            inner: StaticRegistry::new().with_value(
                Hive::LocalMachine,
                DEFAULT_REGISTRY_KEY,
                "other",
                "x",
            ),
            open: open.clone(),
        };
        assert!(cygpath_exe(&wrong_value, &config).is_err());
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }
}
