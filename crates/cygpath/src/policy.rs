use crate::config::CygpathConfig;
use crate::launcher::CygpathLauncher;
use launcher_api::{Launcher, LauncherDecorator, NodeContext};
use std::sync::Arc;
use tracing::debug;

/// Decorates launchers for non-Unix nodes with cygpath translation.
#[derive(Clone, Debug, Default)]
pub struct CygpathDecorator {
    config: CygpathConfig,
}

impl CygpathDecorator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CygpathConfig) -> Self {
        Self { config }
    }
}

impl LauncherDecorator for CygpathDecorator {
    /// Unix nodes get `base` back as-is; their paths are already native.
    fn decorate(&self, base: Arc<dyn Launcher>, node: &NodeContext) -> Arc<dyn Launcher> {
        if node.is_unix() {
            debug!(target: "cygpath::policy", node = node.name(), "unix node; launcher left undecorated");
            return base;
        }

        debug!(target: "cygpath::policy", node = node.name(), "decorating launcher with cygpath translation");
        Arc::new(CygpathLauncher::with_config(base, &self.config))
    }
}
