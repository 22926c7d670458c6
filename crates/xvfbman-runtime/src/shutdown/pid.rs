//! Synchronous best-effort kills by raw PID.
//!
//! Used on `Drop` paths (exit cleanup, registry backstop) where the async
//! escalation in `child.rs` is unavailable. These cannot reap: the `Child`
//! handle is either gone or being dropped alongside, so a zombie may remain
//! until the host process exits.

#[cfg(unix)]
use std::thread::sleep;
#[cfg(unix)]
use std::time::Duration;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tracing::debug;

/// Terminate a process by PID with a blocking SIGTERM -> SIGKILL escalation.
///
/// Waits up to 3 seconds (250 ms cadence) for the process to exit after
/// SIGTERM before escalating. All signal errors are swallowed; the goal is
/// "process gone", verified by polling existence, not by the signal call
/// succeeding.
#[cfg(unix)]
pub(crate) fn terminate_pid_blocking(pid: u32) {
    let nix_pid = Pid::from_raw(pid as i32);

    match signal::kill(nix_pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return,
        Err(e) => debug!(pid, "SIGTERM failed: {}", e),
    }

    for _ in 0..12 {
        sleep(Duration::from_millis(250));
        // Null signal probes existence without affecting the process
        match signal::kill(nix_pid, None) {
            Err(Errno::ESRCH) => return,
            Ok(()) | Err(_) => {}
        }
    }

    debug!(pid, "Process ignored SIGTERM at exit, sending SIGKILL");
    let _ = signal::kill(nix_pid, Signal::SIGKILL);
}

#[cfg(not(unix))]
pub(crate) fn terminate_pid_blocking(_pid: u32) {
    // No signal support; the registry backstop relies on handle-level kills
}

/// Immediately SIGKILL a process by PID, ignoring every failure mode.
#[cfg(unix)]
pub(crate) fn force_kill_pid(pid: u32) {
    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
pub(crate) fn force_kill_pid(_pid: u32) {}
