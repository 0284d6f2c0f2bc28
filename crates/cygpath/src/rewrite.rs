//! Rewriting the executable of a command vector through cygpath.

use crate::locator::ToolLocator;
use launcher_api::interrupt;
use launcher_api::{LaunchError, LaunchRequest, Launcher, SharedBuffer, StreamTarget};
use tracing::debug;

/// Whether `exe` names a path rather than a bare command.
pub fn has_path_separator(exe: &str) -> bool {
    exe.contains(['/', '\\'])
}

/// Translates element 0 of command vectors by running cygpath through the
/// undecorated launcher.
pub struct PathRewriter<'a> {
    base: &'a dyn Launcher,
    locator: &'a ToolLocator,
}

impl<'a> PathRewriter<'a> {
    pub fn new(base: &'a dyn Launcher, locator: &'a ToolLocator) -> Self {
        Self { base, locator }
    }

    /// Return `cmds` with the executable translated to a native path, or
    /// unchanged when translation is skipped or does not succeed.
    ///
    /// Bare command names are left alone: they are found through the node's
    /// PATH, and `cygpath -w` would prefix them with the current directory.
    /// An interruption while waiting abandons the translation and re-asserts
    /// the thread's interrupt flag. Failures that mean processes cannot be
    /// started at all, and a worker that cannot locate its Cygwin
    /// installation, are returned as errors.
    pub fn rewrite(&self, mut cmds: Vec<String>) -> Result<Vec<String>, LaunchError> {
        let Some(exe) = cmds.first() else {
            return Ok(cmds);
        };
        if !has_path_separator(exe) {
            return Ok(cmds);
        }

        match self.translate(exe) {
            Ok(Some(native)) => {
                debug!(target: "cygpath::rewrite", from = %exe, to = %native, "translated executable path");
                cmds[0] = native;
                Ok(cmds)
            }
            Ok(None) => Ok(cmds),
            Err(LaunchError::Interrupted) => {
                debug!(target: "cygpath::rewrite", exe = %exe, "interrupted during translation; keeping original path");
                interrupt::interrupt_current();
                Ok(cmds)
            }
            Err(err) => Err(err),
        }
    }

    fn translate(&self, exe: &str) -> Result<Option<String>, LaunchError> {
        let channel = self.base.channel();
        let tool = self.locator.locate(channel.as_deref())?;

        let stdout = SharedBuffer::new();
        let request = LaunchRequest::new([tool.as_str(), "-w", exe])
            .stdout(StreamTarget::Buffer(stdout.clone()));

        let mut proc = match self.base.launch(&request) {
            Ok(proc) => proc,
            Err(err) if err.is_not_found() => {
                debug!(target: "cygpath::rewrite", tool = %tool, error = %err, "cygpath not found; keeping original path");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let code = match proc.join() {
            Ok(code) => code,
            Err(LaunchError::Interrupted) => {
                debug!(target: "cygpath::rewrite", pid = ?proc.pid(), "killing abandoned cygpath");
                if let Err(err) = proc.kill() {
                    debug!(target: "cygpath::rewrite", error = %err, "failed to kill abandoned cygpath");
                }
                return Err(LaunchError::Interrupted);
            }
            Err(err) => return Err(err),
        };
        if code != 0 {
            debug!(target: "cygpath::rewrite", exe = %exe, code, "cygpath failed; keeping original path");
            return Ok(None);
        }

        let converted = stdout.to_string_lossy().trim().to_string();
        if converted.is_empty() {
            // Seen with cygwin 1.7: exit 0 with nothing on stdout.
            debug!(target: "cygpath::rewrite", exe = %exe, "cygpath produced no output; keeping original path");
            return Ok(None);
        }
        Ok(Some(converted))
    }
}
