//! Killing processes by environment cookie.

use launcher_api::LaunchError;
use std::collections::BTreeMap;

/// Whether a NUL-separated `environ` block contains every pair of `model`.
/// An empty model never matches.
pub(crate) fn env_matches(environ: &[u8], model: &BTreeMap<String, String>) -> bool {
    if model.is_empty() {
        return false;
    }
    let vars: Vec<(&[u8], &[u8])> = environ
        .split(|b| *b == 0)
        .filter_map(|entry| {
            let eq = entry.iter().position(|b| *b == b'=')?;
            Some((&entry[..eq], &entry[eq + 1..]))
        })
        .collect();

    model.iter().all(|(key, value)| {
        vars.iter()
            .any(|(k, v)| *k == key.as_bytes() && *v == value.as_bytes())
    })
}

#[cfg(target_os = "linux")]
pub(crate) fn kill_matching(model: &BTreeMap<String, String>) -> Result<usize, LaunchError> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::fs;

    if model.is_empty() {
        return Ok(0);
    }

    let own_pid = std::process::id();
    let mut killed = 0;
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        if pid == own_pid {
            continue;
        }
        // Processes owned by other users or already gone are skipped.
        let Ok(environ) = fs::read(entry.path().join("environ")) else {
            continue;
        };
        if !env_matches(&environ, model) {
            continue;
        }
        match kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => killed += 1,
            Err(Errno::ESRCH) => {}
            Err(err) => {
                tracing::warn!(target: "local_launcher", pid, error = %err, "failed to kill process")
            }
        }
    }
    Ok(killed)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn kill_matching(model: &BTreeMap<String, String>) -> Result<usize, LaunchError> {
    tracing::debug!(
        target: "local_launcher",
        vars = model.len(),
        "process environment scan not supported on this platform"
    );
    Ok(0)
}
