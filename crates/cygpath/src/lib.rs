//! Cygpath launcher decoration
//!
//! Build steps are often written against Unix paths (`/bin/sh`,
//! `/usr/local/bin/tool`). A Windows node with Cygwin installed can run them,
//! but only if the executable handed to the OS is a native path. This crate
//! decorates a [`Launcher`](launcher_api::Launcher) so that every command it
//! starts has its executable run through `cygpath -w` first.
//!
//! ## Architecture
//!
//! 1. [`CygpathDecorator`] leaves launchers for Unix nodes untouched and wraps
//!    the rest in a [`CygpathLauncher`].
//! 2. [`CygpathLauncher`] forwards every operation to the wrapped launcher,
//!    rewriting the command vector of process and channel launches.
//! 3. [`PathRewriter`] runs cygpath through the wrapped launcher and swaps in
//!    its output, falling back to the original path when cygpath is missing,
//!    fails, or prints nothing.
//! 4. [`ToolLocator`] decides which cygpath to run: the one on PATH locally,
//!    or the one a remote worker reports from its own registry.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cygpath_decorator::CygpathDecorator;
//! use launcher_api::{LaunchRequest, Launcher, LauncherDecorator, NodeContext};
//! use std::sync::Arc;
//!
//! fn run(base: Arc<dyn Launcher>) -> Result<i32, launcher_api::LaunchError> {
//!     let launcher = CygpathDecorator::new().decorate(base, &NodeContext::local());
//!     launcher.run(&LaunchRequest::new(["/bin/sh", "-c", "echo abc"]))
//! }
//! ```

pub use config::{ConfigError, CygpathConfig};
pub use launcher::CygpathLauncher;
pub use locator::{
    cygpath_exe, cygwin_root, register_worker_calls, LocateCygpath, LocateError, ToolLocator,
};
pub use policy::CygpathDecorator;
pub use rewrite::{has_path_separator, PathRewriter};

pub mod config;
mod launcher;
mod locator;
pub mod logging;
mod policy;
mod rewrite;

#[cfg(test)]
mod test_utils;
