use crate::config::CygpathConfig;
use crate::locator::ToolLocator;
use crate::rewrite::PathRewriter;
use launcher_api::{LaunchError, LaunchRequest, Launcher, Proc, ProcChannel, VirtualChannel};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Launcher that runs the executable of every command through cygpath before
/// handing the request to the wrapped launcher.
///
/// Everything without a command vector is forwarded untouched, including the
/// native execution model, so decorating an already decorated launcher keeps
/// reporting what the innermost launcher reports.
pub struct CygpathLauncher {
    base: Arc<dyn Launcher>,
    locator: ToolLocator,
}

impl CygpathLauncher {
    pub fn new(base: Arc<dyn Launcher>) -> Self {
        Self::with_config(base, &CygpathConfig::default())
    }

    pub fn with_config(base: Arc<dyn Launcher>, config: &CygpathConfig) -> Self {
        Self {
            base,
            locator: ToolLocator::from_config(config),
        }
    }

    /// Copy of `request` with its executable translated. The caller's
    /// request is never modified.
    fn rewrite_request(&self, request: &LaunchRequest) -> Result<LaunchRequest, LaunchError> {
        let mut request = request.clone();
        let cmds = std::mem::take(&mut request.cmds);
        request.cmds = PathRewriter::new(self.base.as_ref(), &self.locator).rewrite(cmds)?;
        Ok(request)
    }
}

impl Launcher for CygpathLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn Proc>, LaunchError> {
        let request = self.rewrite_request(request)?;
        self.base.launch(&request)
    }

    fn launch_channel(&self, request: &LaunchRequest) -> Result<ProcChannel, LaunchError> {
        let request = self.rewrite_request(request)?;
        self.base.launch_channel(&request)
    }

    fn kill(&self, model_env: &BTreeMap<String, String>) -> Result<(), LaunchError> {
        self.base.kill(model_env)
    }

    fn is_unix(&self) -> bool {
        self.base.is_unix()
    }

    fn channel(&self) -> Option<Arc<dyn VirtualChannel>> {
        self.base.channel()
    }
}
