//! Escalating termination for `tokio::process::Child`.

use std::io;
use std::process::ExitStatus;

use tokio::process::Child;

#[cfg(unix)]
use std::time::Duration;
#[cfg(unix)]
use tokio::time::sleep;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tracing::debug;

/// Exit-poll cadence during the graceful phase.
#[cfg(unix)]
const TERM_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Number of graceful polls (3 seconds total).
#[cfg(unix)]
const TERM_POLLS: u32 = 12;

/// Gracefully shut down a child process, escalating to SIGKILL if needed.
///
/// # Strategy
/// 1. Send SIGTERM and poll for exit every 250 ms for up to 3 seconds
/// 2. If still running, send SIGKILL through the handle, poll once more,
///    then signal the raw PID directly as a last resort
/// 3. Wait for process reaping (required to avoid zombies)
///
/// # Platform behavior
/// - Unix: SIGTERM via the nix crate, SIGKILL via `Child::start_kill`
/// - Windows: immediately calls `.kill()` (no graceful shutdown available)
///
/// # Returns
/// - `Ok(ExitStatus)` once the process has been reaped
/// - `Err` if process operations fail; the process may still be dying
pub async fn shutdown_child(child: Child) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        shutdown_unix(child).await
    }

    #[cfg(not(unix))]
    {
        shutdown_windows(child).await
    }
}

#[cfg(unix)]
async fn shutdown_unix(mut child: Child) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already polled to completion elsewhere; just reap
        return child.wait().await;
    };
    let nix_pid = Pid::from_raw(pid as i32);

    // Phase 1: SIGTERM
    if let Err(e) = signal::kill(nix_pid, Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            // Process already exited between our check and the signal
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    // Poll for graceful exit
    for _ in 0..TERM_POLLS {
        sleep(TERM_POLL_INTERVAL).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Ok(status);
        }
    }

    // Phase 2: forced kill through the handle
    debug!(pid, "Process ignored SIGTERM, escalating to SIGKILL");
    if let Err(e) = child.start_kill() {
        debug!(pid, "start_kill failed: {}", e);
    }
    sleep(Duration::from_millis(50)).await;

    // Last resort: signal the raw PID in case the handle-level kill
    // did not take effect
    if matches!(child.try_wait(), Ok(None)) {
        if let Err(e) = signal::kill(nix_pid, Signal::SIGKILL) {
            if e != nix::errno::Errno::ESRCH {
                debug!(pid, "Direct SIGKILL failed: {}", e);
            }
        }
    }

    // Phase 3: reap
    child.wait().await
}

#[cfg(not(unix))]
async fn shutdown_windows(mut child: Child) -> io::Result<ExitStatus> {
    // No SIGTERM equivalent - terminate immediately
    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::process::Command;
    use tokio::time::sleep;

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_responds_to_sigterm() {
        let child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let started = Instant::now();
        let result = shutdown_child(child).await;
        assert!(result.is_ok());
        // sleep dies on SIGTERM, well before the SIGKILL escalation
        assert!(started.elapsed() < std::time::Duration::from_secs(3));
    }

    #[tokio::test]
    async fn shutdown_handles_already_exited() {
        let child = Command::new("echo")
            .arg("test")
            .spawn()
            .expect("failed to spawn echo");

        // Give it time to exit
        sleep(std::time::Duration::from_millis(100)).await;

        let result = shutdown_child(child).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_escalates_past_trapped_sigterm() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("stubborn.sh");
        fs::write(&script, "#!/bin/sh\ntrap '' TERM\nsleep 60\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let child = Command::new(&script).spawn().expect("failed to spawn");
        // Let the trap install before we start signaling
        sleep(std::time::Duration::from_millis(200)).await;

        let started = Instant::now();
        let status = shutdown_child(child).await.unwrap();
        assert!(!status.success());
        // Full graceful window plus the forced kill
        assert!(started.elapsed() >= std::time::Duration::from_secs(3));
    }
}
