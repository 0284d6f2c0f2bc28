//! Launcher abstraction for starting processes on local and remote nodes.
//!
//! This crate provides the traits and value types shared by every launcher
//! implementation, so that decorators can wrap any launcher without knowing
//! how it actually spawns processes.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

pub mod error;
pub mod interrupt;
pub mod node;
pub mod remote;
pub mod request;

pub use error::LaunchError;
pub use node::NodeContext;
pub use remote::{
    CallEnvelope, CallRegistry, LoopbackChannel, RemoteCall, RemoteError, RemoteErrorKind,
    VirtualChannel,
};
pub use request::{LaunchRequest, SharedBuffer, StreamTarget, MASK_PLACEHOLDER};

/// A started process.
pub trait Proc: Send {
    /// OS process id, when the process runs on this host.
    fn pid(&self) -> Option<u32>;

    /// Whether the process is still running.
    fn is_alive(&mut self) -> Result<bool, LaunchError>;

    /// Wait for the process to exit and return its exit code.
    ///
    /// Fails with [`LaunchError::Interrupted`] when the waiting thread is
    /// interrupted; the interrupt flag is cleared in that case.
    fn join(&mut self) -> Result<i32, LaunchError>;

    /// Forcibly terminate the process.
    fn kill(&mut self) -> Result<(), LaunchError>;
}

/// Bidirectional stream to a started process: its stdin, its stdout, and the
/// process itself.
pub struct ProcChannel {
    input: Option<Box<dyn Write + Send>>,
    output: Box<dyn Read + Send>,
    proc: Box<dyn Proc>,
}

impl ProcChannel {
    pub fn new(
        input: Box<dyn Write + Send>,
        output: Box<dyn Read + Send>,
        proc: Box<dyn Proc>,
    ) -> Self {
        Self {
            input: Some(input),
            output,
            proc,
        }
    }

    /// Writer feeding the remote process. `None` once the input was closed.
    pub fn input(&mut self) -> Option<&mut (dyn Write + Send + 'static)> {
        self.input.as_deref_mut()
    }

    pub fn output(&mut self) -> &mut (dyn Read + Send + 'static) {
        self.output.as_mut()
    }

    pub fn proc(&mut self) -> &mut dyn Proc {
        self.proc.as_mut()
    }

    /// Close the input side so the process sees EOF.
    pub fn close_input(&mut self) {
        self.input = None;
    }

    /// Close the input side and wait for the process to exit.
    pub fn join(mut self) -> Result<i32, LaunchError> {
        self.close_input();
        self.proc.join()
    }
}

/// Capability set for starting processes on a node.
///
/// Implementations are expected to be cheap to share behind an `Arc`; all
/// operations take `&self` and may be called concurrently.
pub trait Launcher: Send + Sync {
    /// Start the process described by `request`.
    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn Proc>, LaunchError>;

    /// Start the process described by `request` with its stdin and stdout
    /// wired to the returned channel. `request.stdout` is ignored.
    fn launch_channel(&self, request: &LaunchRequest) -> Result<ProcChannel, LaunchError>;

    /// Kill every process whose environment contains all of `model_env`.
    fn kill(&self, model_env: &BTreeMap<String, String>) -> Result<(), LaunchError>;

    /// Whether processes started by this launcher follow Unix conventions.
    fn is_unix(&self) -> bool;

    /// Channel to the worker this launcher starts processes on, or `None` for
    /// the local node.
    fn channel(&self) -> Option<Arc<dyn VirtualChannel>>;

    /// Launch and wait for the exit code.
    fn run(&self, request: &LaunchRequest) -> Result<i32, LaunchError> {
        self.launch(request)?.join()
    }
}

/// Hook that may replace the launcher used for a node.
pub trait LauncherDecorator: Send + Sync {
    fn decorate(&self, base: Arc<dyn Launcher>, node: &NodeContext) -> Arc<dyn Launcher>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ExitProc {
        code: i32,
    }

    impl Proc for ExitProc {
        fn pid(&self) -> Option<u32> {
            None
        }

        fn is_alive(&mut self) -> Result<bool, LaunchError> {
            Ok(false)
        }

        fn join(&mut self) -> Result<i32, LaunchError> {
            Ok(self.code)
        }

        fn kill(&mut self) -> Result<(), LaunchError> {
            Ok(())
        }
    }

    struct WriterProbe(Arc<AtomicBool>);

    impl Write for WriterProbe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Drop for WriterProbe {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn channel_join_closes_input_first() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut channel = ProcChannel::new(
            Box::new(WriterProbe(closed.clone())),
            Box::new(Cursor::new(b"pong".to_vec())),
            Box::new(ExitProc { code: 3 }),
        );

        let mut out = String::new();
        channel.output().read_to_string(&mut out).unwrap();
        assert_eq!(out, "pong");
        assert!(channel.input().is_some());

        assert_eq!(channel.join().unwrap(), 3);
        assert!(closed.load(Ordering::SeqCst));
    }
}
