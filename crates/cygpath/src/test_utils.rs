//! Scripted launcher for exercising the decorator without spawning processes.

use crate::config::{CygpathConfig, DEFAULT_REGISTRY_KEY};
use crate::locator::register_worker_calls;
use launcher_api::{
    CallRegistry, LaunchError, LaunchRequest, Launcher, LoopbackChannel, Proc, ProcChannel,
    StreamTarget, VirtualChannel,
};
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use win_registry::{Hive, StaticRegistry};

/// How the translation tool behaves when the scripted launcher runs it.
#[derive(Clone, Debug)]
pub(crate) enum ToolScript {
    Exit { code: i32, stdout: String },
    /// Spawning fails because the executable does not exist.
    Missing,
    /// Spawning fails for any other reason.
    SpawnFails,
    /// The tool starts but waiting on it is interrupted.
    Interrupted,
}

impl ToolScript {
    pub(crate) fn exit(code: i32, stdout: &str) -> Self {
        Self::Exit {
            code,
            stdout: stdout.to_string(),
        }
    }
}

enum Outcome {
    Exit(i32),
    Interrupted,
}

struct ScriptedProc {
    outcome: Outcome,
    killed: Arc<AtomicUsize>,
}

impl Proc for ScriptedProc {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn is_alive(&mut self) -> Result<bool, LaunchError> {
        Ok(false)
    }

    fn join(&mut self) -> Result<i32, LaunchError> {
        match self.outcome {
            Outcome::Exit(code) => Ok(code),
            Outcome::Interrupted => Err(LaunchError::Interrupted),
        }
    }

    fn kill(&mut self) -> Result<(), LaunchError> {
        self.killed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every request and answers `<tool> -w <path>` invocations from a
/// [`ToolScript`]; everything else exits 0.
pub(crate) struct ScriptedLauncher {
    unix: bool,
    script: ToolScript,
    channel: Option<Arc<dyn VirtualChannel>>,
    launches: Mutex<Vec<LaunchRequest>>,
    channels: Mutex<Vec<LaunchRequest>>,
    kills: Mutex<Vec<BTreeMap<String, String>>>,
    killed_procs: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub(crate) fn windows(script: ToolScript) -> Self {
        Self {
            unix: false,
            script,
            channel: None,
            launches: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            kills: Mutex::new(Vec::new()),
            killed_procs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_unix(mut self, unix: bool) -> Self {
        self.unix = unix;
        self
    }

    pub(crate) fn with_channel(mut self, channel: Arc<dyn VirtualChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    fn is_tool_call(request: &LaunchRequest) -> bool {
        request.cmds.len() == 3 && request.cmds[1] == "-w"
    }

    /// Command vectors of translation tool runs, in order.
    pub(crate) fn tool_calls(&self) -> Vec<Vec<String>> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .filter(|r| Self::is_tool_call(r))
            .map(|r| r.cmds.clone())
            .collect()
    }

    /// Requests for everything other than the translation tool.
    pub(crate) fn launched(&self) -> Vec<LaunchRequest> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !Self::is_tool_call(r))
            .cloned()
            .collect()
    }

    pub(crate) fn channel_requests(&self) -> Vec<LaunchRequest> {
        self.channels.lock().unwrap().clone()
    }

    pub(crate) fn kills(&self) -> Vec<BTreeMap<String, String>> {
        self.kills.lock().unwrap().clone()
    }

    /// How many started processes were killed through [`Proc::kill`].
    pub(crate) fn killed_procs(&self) -> usize {
        self.killed_procs.load(Ordering::SeqCst)
    }

    fn proc(&self, outcome: Outcome) -> Box<dyn Proc> {
        Box::new(ScriptedProc {
            outcome,
            killed: self.killed_procs.clone(),
        })
    }
}

impl Launcher for ScriptedLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn Proc>, LaunchError> {
        self.launches.lock().unwrap().push(request.clone());

        if !Self::is_tool_call(request) {
            return Ok(self.proc(Outcome::Exit(0)));
        }

        let outcome = match &self.script {
            ToolScript::Exit { code, stdout } => {
                if let StreamTarget::Buffer(sink) = &request.stdout {
                    sink.extend(stdout.as_bytes());
                }
                Outcome::Exit(*code)
            }
            ToolScript::Missing => {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such file").into())
            }
            ToolScript::SpawnFails => {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "fork failed").into())
            }
            ToolScript::Interrupted => Outcome::Interrupted,
        };
        Ok(self.proc(outcome))
    }

    fn launch_channel(&self, request: &LaunchRequest) -> Result<ProcChannel, LaunchError> {
        self.channels.lock().unwrap().push(request.clone());
        Ok(ProcChannel::new(
            Box::new(io::sink()),
            Box::new(io::empty()),
            self.proc(Outcome::Exit(0)),
        ))
    }

    fn kill(&self, model_env: &BTreeMap<String, String>) -> Result<(), LaunchError> {
        self.kills.lock().unwrap().push(model_env.clone());
        Ok(())
    }

    fn is_unix(&self) -> bool {
        self.unix
    }

    fn channel(&self) -> Option<Arc<dyn VirtualChannel>> {
        self.channel.clone()
    }
}

/// In-process worker whose registry knows `cygwin_root`, or nothing at all.
pub(crate) fn worker_channel(cygwin_root: Option<&str>) -> Arc<dyn VirtualChannel> {
    let mut registry = StaticRegistry::new();
    if let Some(root) = cygwin_root {
        registry = registry.with_value(Hive::LocalMachine, DEFAULT_REGISTRY_KEY, "native", root);
    }
    let mut calls = CallRegistry::new();
    register_worker_calls(&mut calls, Arc::new(registry), CygpathConfig::default());
    Arc::new(LoopbackChannel::new(calls))
}
