//! Launcher that starts processes on the local host through `std::process`.

use launcher_api::interrupt;
use launcher_api::{
    LaunchError, LaunchRequest, Launcher, Proc, ProcChannel, SharedBuffer, StreamTarget,
    VirtualChannel,
};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

mod kill;

/// How often `join` checks for exit and interruption.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Starts processes on this host.
#[derive(Clone)]
pub struct LocalLauncher {
    unix: bool,
    channel: Option<Arc<dyn VirtualChannel>>,
}

impl Default for LocalLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLauncher {
    pub fn new() -> Self {
        Self {
            unix: cfg!(unix),
            channel: None,
        }
    }

    /// Report `unix` as the native execution model instead of the host's.
    pub fn with_unix(mut self, unix: bool) -> Self {
        self.unix = unix;
        self
    }

    /// Attach the channel reported by [`Launcher::channel`].
    pub fn with_channel(mut self, channel: Arc<dyn VirtualChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    fn command(&self, request: &LaunchRequest) -> Result<Command, LaunchError> {
        let (program, args) = request
            .cmds
            .split_first()
            .ok_or(LaunchError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args).envs(&request.envs);
        if let Some(pwd) = &request.pwd {
            cmd.current_dir(pwd);
        }
        Ok(cmd)
    }

    fn spawn(&self, mut cmd: Command, request: &LaunchRequest) -> Result<Child, LaunchError> {
        debug!(
            target: "local_launcher",
            cmd = %request.display_cmds(),
            pwd = ?request.pwd,
            "starting process"
        );
        cmd.spawn().map_err(|err| {
            let program = request.executable().unwrap_or_default();
            LaunchError::Io(io::Error::new(
                err.kind(),
                format!("failed to start {program}: {err}"),
            ))
        })
    }
}

fn stdio_for(target: &StreamTarget) -> Stdio {
    match target {
        StreamTarget::Inherit => Stdio::inherit(),
        StreamTarget::Null => Stdio::null(),
        StreamTarget::Buffer(_) => Stdio::piped(),
    }
}

fn spawn_collector<R>(mut reader: R, sink: SharedBuffer) -> thread::JoinHandle<io::Result<()>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            sink.extend(&chunk[..read]);
        }
        Ok(())
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    status.code().unwrap_or(-1)
}

/// Process started by [`LocalLauncher`].
pub struct LocalProc {
    child: Child,
    collectors: Vec<thread::JoinHandle<io::Result<()>>>,
    exit: Option<i32>,
}

impl LocalProc {
    fn finish(&mut self, status: ExitStatus) -> i32 {
        for collector in self.collectors.drain(..) {
            match collector.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(target: "local_launcher", error = %err, "output collector failed")
                }
                Err(_) => warn!(target: "local_launcher", "output collector panicked"),
            }
        }
        let code = exit_code(status);
        self.exit = Some(code);
        code
    }
}

impl Proc for LocalProc {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn is_alive(&mut self) -> Result<bool, LaunchError> {
        if self.exit.is_some() {
            return Ok(false);
        }
        Ok(self.child.try_wait()?.is_none())
    }

    fn join(&mut self) -> Result<i32, LaunchError> {
        if let Some(code) = self.exit {
            return Ok(code);
        }
        loop {
            if interrupt::take_interrupted() {
                return Err(LaunchError::Interrupted);
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(self.finish(status));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill(&mut self) -> Result<(), LaunchError> {
        if self.exit.is_some() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => {}
            Err(err) => return Err(err.into()),
        }
        let status = self.child.wait()?;
        self.finish(status);
        Ok(())
    }
}

impl Launcher for LocalLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn Proc>, LaunchError> {
        let mut cmd = self.command(request)?;
        cmd.stdin(Stdio::null())
            .stdout(stdio_for(&request.stdout))
            .stderr(stdio_for(&request.stderr));

        let mut child = self.spawn(cmd, request)?;

        let mut collectors = Vec::new();
        if let (StreamTarget::Buffer(sink), Some(out)) = (&request.stdout, child.stdout.take()) {
            collectors.push(spawn_collector(out, sink.clone()));
        }
        if let (StreamTarget::Buffer(sink), Some(err)) = (&request.stderr, child.stderr.take()) {
            collectors.push(spawn_collector(err, sink.clone()));
        }

        Ok(Box::new(LocalProc {
            child,
            collectors,
            exit: None,
        }))
    }

    fn launch_channel(&self, request: &LaunchRequest) -> Result<ProcChannel, LaunchError> {
        let mut cmd = self.command(request)?;
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stdio_for(&request.stderr));

        let mut child = self.spawn(cmd, request)?;

        let missing = |stream: &str| {
            LaunchError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("child {stream} was not piped"),
            ))
        };
        let input = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let output = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        let mut collectors = Vec::new();
        if let (StreamTarget::Buffer(sink), Some(err)) = (&request.stderr, child.stderr.take()) {
            collectors.push(spawn_collector(err, sink.clone()));
        }

        let proc = LocalProc {
            child,
            collectors,
            exit: None,
        };
        Ok(ProcChannel::new(
            Box::new(input),
            Box::new(output),
            Box::new(proc),
        ))
    }

    fn kill(&self, model_env: &BTreeMap<String, String>) -> Result<(), LaunchError> {
        let killed = kill::kill_matching(model_env)?;
        debug!(target: "local_launcher", killed, "killed processes matching environment");
        Ok(())
    }

    fn is_unix(&self) -> bool {
        self.unix
    }

    fn channel(&self) -> Option<Arc<dyn VirtualChannel>> {
        self.channel.clone()
    }
}
