//! Xvfb session supervisor.
//!
//! `XvfbManager` owns the slot registry and drives the full session
//! lifecycle: reserve a server number, spawn Xvfb against it, watch the
//! crash-detection window, and escalate termination on stop. The registry
//! mutex is held only for map mutations, never across a polling window, so
//! a reservation is visible to every other caller before the process exists.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use xvfbman_core::{DISPLAY_ENV, Result, ScreenConfig, XvfbError, display_str_for_server_num};

use crate::capture::OutputCapture;
use crate::cleanup::CleanupGuard;
use crate::command::spawn_xvfb;
use crate::registry::{SessionRegistry, SlotQuery};
use crate::shutdown::shutdown_child;
use crate::types::SessionInfo;

/// Where Xvfb lives on stock installations.
pub const DEFAULT_XVFB_PATH: &str = "/usr/bin/Xvfb";

/// First server number `ensure_display` tries by default.
pub const DEFAULT_RANGE_FIRST: u32 = 50;
/// Last server number `ensure_display` tries by default.
pub const DEFAULT_RANGE_LAST: u32 = 99;

/// Output substring that marks failure as display-address contention
/// rather than a genuine launch defect.
const CONTENTION_MARKER: &str = "Server is already active for display";

/// Crash-detection window: 6 polls at 500 ms (3 seconds total).
const CRASH_WINDOW_POLLS: u32 = 6;
const CRASH_WINDOW_INTERVAL: Duration = Duration::from_millis(500);

/// Placeholder-resolution wait in `stop`: 8 polls at 500 ms (4 seconds),
/// longer than the crash-detection window so a concurrent `start` has time
/// to commit or unwind.
const RESOLVE_POLLS: u32 = 8;
const RESOLVE_INTERVAL: Duration = Duration::from_millis(500);

/// Supervisor for managed Xvfb sessions.
///
/// Construct one per host application. All state lives in the manager;
/// two independent managers (or two independent processes) can race for
/// the same OS-level display address, which `start` then reports as
/// [`XvfbError::DisplayInUse`].
pub struct XvfbManager {
    registry: Arc<Mutex<SessionRegistry>>,
    xvfb_path: PathBuf,
}

impl Default for XvfbManager {
    fn default() -> Self {
        Self::new(DEFAULT_XVFB_PATH)
    }
}

impl XvfbManager {
    /// Create a manager that launches the given Xvfb binary.
    pub fn new(xvfb_path: impl Into<PathBuf>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(SessionRegistry::new())),
            xvfb_path: xvfb_path.into(),
        }
    }

    /// Path of the supervised binary.
    pub fn xvfb_path(&self) -> &Path {
        &self.xvfb_path
    }

    fn lock(&self) -> MutexGuard<'_, SessionRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a specific server number is tracked (reserving or active).
    pub fn is_active(&self, server_num: u32) -> bool {
        self.lock().is_tracked(server_num)
    }

    /// Whether any session at all is tracked.
    pub fn is_any_active(&self) -> bool {
        self.lock().any_tracked()
    }

    /// Snapshots of every committed session.
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.lock().active_sessions()
    }

    /// Capture file path for a tracked slot, if any. Diagnostic only; the
    /// file disappears when the slot is released.
    pub fn capture_path(&self, server_num: u32) -> Option<PathBuf> {
        self.lock().capture_path(server_num)
    }

    /// Drop sessions whose Xvfb exited on its own; returns their numbers.
    pub fn sweep_exited(&self) -> Vec<u32> {
        self.lock().sweep_exited()
    }

    /// Start a managed Xvfb session on a specific server number.
    ///
    /// Reserves the number, spawns `Xvfb :<n> -screen 0 <geometry>` with its
    /// output captured, then watches the process for 3 seconds to catch an
    /// immediate crash. On success returns the `DISPLAY` string for the
    /// session (`":<n>.0"`).
    ///
    /// # Errors
    ///
    /// - [`XvfbError::AlreadyActive`] if this manager already tracks the number
    /// - [`XvfbError::DisplayInUse`] if Xvfb exited reporting the display
    ///   address is bound by some other server
    /// - [`XvfbError::SpawnFailed`] if the process could not be spawned
    /// - [`XvfbError::StartupFailed`] if it exited early for any other
    ///   reason, with exit code and captured output
    ///
    /// Every failure path fully unwinds the reservation and capture file.
    pub async fn start(&self, server_num: u32, screen: &ScreenConfig) -> Result<String> {
        // Reserve the slot and register the capture sink in one critical
        // section; from here on the number is ours until we remove it.
        let capture_path = {
            let mut reg = self.lock();
            if reg.is_tracked(server_num) {
                return Err(XvfbError::AlreadyActive { server_num });
            }
            let capture = OutputCapture::new()
                .map_err(|source| XvfbError::SpawnFailed { server_num, source })?;
            let path = capture.path().to_path_buf();
            reg.reserve(server_num, capture)?;
            path
        };
        debug!(server_num, capture = %capture_path.display(), "Reserved slot");

        let mut child = {
            let spawned = {
                let reg = self.lock();
                // The capture lives in the registry now; borrow it just long
                // enough to clone stdio handles for the spawn.
                reg.with_capture(server_num, |cap| {
                    spawn_xvfb(&self.xvfb_path, server_num, screen, cap)
                })
            };
            match spawned {
                Some(Ok(child)) => child,
                Some(Err(source)) => {
                    self.lock().remove(server_num);
                    return Err(XvfbError::SpawnFailed { server_num, source });
                }
                None => {
                    // Only possible if a racing stop self-healed the
                    // reservation out from under us
                    warn!(server_num, "Reservation disappeared before spawn");
                    return Err(XvfbError::StartupFailed {
                        server_num,
                        exit_code: None,
                        output: "Session reservation disappeared before spawn".to_string(),
                    });
                }
            }
        };

        let Some(pid) = child.id() else {
            let _ = child.start_kill();
            self.lock().remove(server_num);
            return Err(XvfbError::StartupFailed {
                server_num,
                exit_code: None,
                output: "Xvfb exited before its PID could be read".to_string(),
            });
        };

        // Crash-detection window: catch servers that die immediately, e.g.
        // because the display address is already bound outside our tracking.
        for _ in 0..CRASH_WINDOW_POLLS {
            sleep(CRASH_WINDOW_INTERVAL).await;

            match child.try_wait() {
                Ok(Some(status)) => {
                    let removed = self.lock().remove(server_num);
                    let output = removed
                        .map(|slot| slot.read_output())
                        .unwrap_or_default();
                    let exit_code = status.code();

                    if output.contains(CONTENTION_MARKER) {
                        info!(server_num, "Display address already in use");
                        return Err(XvfbError::DisplayInUse {
                            server_num,
                            exit_code: exit_code.unwrap_or(1),
                        });
                    }
                    return Err(XvfbError::StartupFailed {
                        server_num,
                        exit_code,
                        output,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    // Status unknown; keep polling, the window bounds us
                    debug!(server_num, "try_wait failed: {}", e);
                }
            }
        }

        // Commit: the process survived the window
        if let Err(mut orphan) = self.lock().attach(server_num, pid, child) {
            // Only possible if a racing stop self-healed the reservation,
            // which the 4-second resolve window is sized to prevent
            warn!(server_num, pid, "Reservation lost during startup window");
            let _ = orphan.start_kill();
            return Err(XvfbError::StartupFailed {
                server_num,
                exit_code: None,
                output: "Session reservation disappeared during startup".to_string(),
            });
        }

        info!(server_num, pid, screen = %screen, "Xvfb session started");
        Ok(display_str_for_server_num(server_num))
    }

    /// Start a session on the first free server number in `first..=last`.
    ///
    /// Numbers already tracked here, or reported in use by the OS, are
    /// skipped. A genuine launch defect is not number-specific, so
    /// [`XvfbError::SpawnFailed`]/[`XvfbError::StartupFailed`] abort the
    /// scan immediately.
    ///
    /// # Errors
    ///
    /// [`XvfbError::RangeExhausted`] when every number in the range was in
    /// use; otherwise the propagated launch failure.
    pub async fn start_in_range(
        &self,
        first: u32,
        last: u32,
        screen: &ScreenConfig,
    ) -> Result<u32> {
        for server_num in first..=last {
            if self.is_active(server_num) {
                continue;
            }

            match self.start(server_num, screen).await {
                Ok(_) => return Ok(server_num),
                Err(e) if e.is_slot_contention() => {
                    debug!(server_num, "Server num taken, trying next: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(XvfbError::RangeExhausted { first, last })
    }

    /// Stop a managed session.
    ///
    /// Returns `false` if the number is not tracked; stopping a session that
    /// does not exist is a benign no-op. Otherwise runs the termination
    /// escalation and returns `true` once the slot and its capture file are
    /// released.
    ///
    /// If the slot is still a reservation placeholder (a concurrent `start`
    /// in its crash-detection window), waits up to 4 seconds for the handle
    /// to be attached; if it never is, the other `start` failed asymmetrically
    /// and the leftover reservation is cleaned up here.
    pub async fn stop(&self, server_num: u32) -> bool {
        let mut polls = 0;
        let removed = loop {
            let mut reg = self.lock();
            match reg.state(server_num) {
                SlotQuery::Absent => return false,
                SlotQuery::Active => break reg.remove(server_num),
                SlotQuery::Reserving if polls >= RESOLVE_POLLS => {
                    // Self-heal: the start that reserved this slot is gone
                    info!(server_num, "Cleaning up abandoned reservation");
                    reg.remove(server_num);
                    return true;
                }
                SlotQuery::Reserving => {}
            }
            drop(reg);

            sleep(RESOLVE_INTERVAL).await;
            polls += 1;
        };

        if let Some(slot) = removed {
            if let Some(child) = slot.child {
                debug!(server_num, pid = ?slot.pid, "Stopping Xvfb session");
                // Best-effort: "process gone" is verified by the escalation's
                // own polling, not by this call succeeding
                if let Err(e) = shutdown_child(child).await {
                    debug!(server_num, "Shutdown returned error: {}", e);
                }
            }
            // Dropping the slot deletes the capture file
        }

        info!(server_num, "Xvfb session stopped");
        true
    }

    /// Stop every managed session; returns how many were tracked.
    ///
    /// Operates on a snapshot of the tracked numbers, so sessions started
    /// concurrently with the sweep may survive it.
    pub async fn stop_all(&self) -> usize {
        let nums = self.lock().tracked_server_nums();
        for &server_num in &nums {
            self.stop(server_num).await;
        }
        nums.len()
    }

    /// Make sure a `DISPLAY` is available, starting an Xvfb if needed.
    ///
    /// If `DISPLAY` is already set and non-empty, does nothing and returns
    /// `false`. Otherwise starts a session in the default range (50..=99),
    /// points `DISPLAY` at it, and returns `true`.
    ///
    /// # Errors
    ///
    /// Propagates any failure from [`Self::start_in_range`].
    pub async fn ensure_display(&self, screen: &ScreenConfig) -> Result<bool> {
        self.ensure_display_in_range(DEFAULT_RANGE_FIRST, DEFAULT_RANGE_LAST, screen)
            .await
    }

    /// [`Self::ensure_display`] with an explicit server-number range.
    #[allow(unsafe_code)]
    pub async fn ensure_display_in_range(
        &self,
        first: u32,
        last: u32,
        screen: &ScreenConfig,
    ) -> Result<bool> {
        if env::var(DISPLAY_ENV).is_ok_and(|v| !v.is_empty()) {
            debug!("DISPLAY already set, leaving it alone");
            return Ok(false);
        }

        let server_num = self.start_in_range(first, last, screen).await?;
        // Named `display_value` rather than `display`: the tracing macros
        // shadow a local called `display` (tokio-rs/tracing#2332).
        let display_value = display_str_for_server_num(server_num);
        info!(display = %display_value, "Pointing DISPLAY at managed Xvfb");
        // SAFETY: single mutation of the process environment, same contract
        // as every other env::set_var call site in this workspace
        unsafe {
            env::set_var(DISPLAY_ENV, &display_value);
        }
        Ok(true)
    }

    /// Arrange for every managed session to be stopped when the returned
    /// guard is dropped, typically at the end of `main`.
    ///
    /// Holding two guards runs cleanup twice, which is harmless: the second
    /// pass finds an empty registry.
    pub fn register_exit_cleanup(&self) -> CleanupGuard {
        CleanupGuard::new(Arc::clone(&self.registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_manager_tracks_nothing() {
        let manager = XvfbManager::default();
        assert!(!manager.is_any_active());
        assert!(!manager.is_active(0));
        assert!(manager.active_sessions().is_empty());
        assert_eq!(manager.xvfb_path(), Path::new(DEFAULT_XVFB_PATH));
    }

    #[tokio::test]
    async fn stop_on_untracked_is_a_noop() {
        let manager = XvfbManager::default();
        assert!(!manager.stop(123).await);
        assert_eq!(manager.stop_all().await, 0);
    }

    #[tokio::test]
    async fn spawn_failure_unwinds_reservation() {
        let manager = XvfbManager::new("/nonexistent/path/Xvfb");
        let err = manager
            .start(31, &ScreenConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, XvfbError::SpawnFailed { server_num: 31, .. }));
        assert!(!manager.is_active(31));
        assert!(manager.capture_path(31).is_none());
    }
}
