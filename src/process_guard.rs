//! Child process lifecycle for task steps
//!
//! Every tool a task launches (pip, setup.py, vagrant, git) runs in its own
//! process group and is tracked in a global registry. If the runner receives
//! SIGINT, SIGTERM or SIGHUP, the whole group of the running tool is sent
//! SIGTERM, then SIGKILL once the grace period expires. Without this, an
//! interrupted `vagrant up` keeps provisioning a VM nobody will destroy.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of running child process IDs
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set once termination started, so a second signal is a no-op
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        tracing::debug!(pid, "registered child process");
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        tracing::debug!(pid, "unregistered child process");
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked children.
    ///
    /// Sends SIGTERM to each process group, waits up to `grace_period` for
    /// them to exit, then sends SIGKILL to whatever is left.
    #[cfg(unix)]
    pub fn terminate_all(&mut self, grace_period: Duration) {
        use nix::sys::signal::Signal;
        use std::time::Instant;

        if self.cleanup_initiated {
            tracing::debug!("child cleanup already initiated");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            return;
        }

        tracing::info!(count = self.pids.len(), "terminating running task steps");

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            if let Err(e) = send_signal_to_group(pid, Signal::SIGTERM) {
                tracing::warn!(pid, error = %e, "SIGTERM to process group failed");
                let _ = send_signal(pid, Signal::SIGTERM);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                tracing::info!("all task steps terminated");
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if is_process_alive(pid) {
                tracing::warn!(pid, "process group ignored SIGTERM, sending SIGKILL");
                if send_signal_to_group(pid, Signal::SIGKILL).is_err() {
                    let _ = send_signal(pid, Signal::SIGKILL);
                }
            }
        }

        self.pids.clear();
    }

    #[cfg(not(unix))]
    pub fn terminate_all(&mut self, _grace_period: Duration) {
        self.cleanup_initiated = true;
        self.pids.clear();
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), nix::Error> {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal)
}

/// Negative PID addresses the whole group, so grandchildren (e.g. the
/// VirtualBox processes under vagrant) are signalled too.
#[cfg(unix)]
fn send_signal_to_group(pgid: u32, signal: nix::sys::signal::Signal) -> Result<(), nix::Error> {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(-(pgid as i32)), signal)
}

/// Zombies and dead entries in /proc count as not alive
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    if nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    true
}

/// Install the signal thread that tears down running task steps.
///
/// Call once at program start. The process exits with `128 + signal`.
#[cfg(unix)]
pub fn init_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            tracing::info!(signal = sig, "received signal, stopping task");
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
pub fn init_signal_handlers() -> std::io::Result<()> {
    Ok(())
}

/// Extension trait for `std::process::Command` to isolate a step in its own
/// process group
pub trait CommandProcessGroup {
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    #[cfg(unix)]
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // PGID = child PID, so the registry PID doubles as the group ID
        self.process_group(0);
        set_parent_death_signal(self);
        self
    }

    #[cfg(not(unix))]
    fn in_new_process_group(&mut self) -> &mut Self {
        self
    }
}

/// Child dies with the runner instead of outliving it
#[cfg(target_os = "linux")]
fn set_parent_death_signal(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.pre_exec(|| {
            if nix::libc::prctl(nix::libc::PR_SET_PDEATHSIG, nix::libc::SIGTERM) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn set_parent_death_signal(_cmd: &mut std::process::Command) {}
