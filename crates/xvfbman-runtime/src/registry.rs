//! Slot registry: the map from server number to supervised session.
//!
//! A slot is either *reserving* (placeholder inserted, process not yet
//! confirmed alive) or *active* (child handle attached). The registry is the
//! only shared mutable state in the crate; `XvfbManager` guards it with a
//! mutex and keeps every critical section short, so the reservation is
//! visible to all callers before the process is spawned.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::process::Child;
use tracing::{debug, warn};
use xvfbman_core::{Result, XvfbError};

use crate::capture::OutputCapture;
use crate::types::SessionInfo;

enum SlotState {
    /// Placeholder: a `start` call owns this number but has not committed yet
    Reserving,
    /// Committed: the process survived the crash-detection window
    Active {
        child: Child,
        pid: u32,
        started_at: u64,
    },
}

struct Slot {
    state: SlotState,
    capture: OutputCapture,
}

/// Observable state of one server number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotQuery {
    Absent,
    Reserving,
    Active,
}

/// A slot taken out of the registry, ready for teardown.
///
/// Dropping it deletes the capture file. The child handle, if any, is the
/// caller's to terminate and reap.
pub(crate) struct RemovedSlot {
    pub(crate) child: Option<Child>,
    pub(crate) pid: Option<u32>,
    capture: OutputCapture,
}

impl RemovedSlot {
    /// Read the captured process output from the start of the file.
    pub(crate) fn read_output(&self) -> String {
        self.capture.read_from_start()
    }
}

/// Mapping from server number to supervised session.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    slots: HashMap<u32, Slot>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `server_num` with a placeholder entry.
    ///
    /// The capture sink is registered at the same time, so a later self-heal
    /// of an abandoned reservation releases it too.
    pub(crate) fn reserve(&mut self, server_num: u32, capture: OutputCapture) -> Result<()> {
        if self.slots.contains_key(&server_num) {
            return Err(XvfbError::AlreadyActive { server_num });
        }
        self.slots.insert(
            server_num,
            Slot {
                state: SlotState::Reserving,
                capture,
            },
        );
        Ok(())
    }

    /// Commit a reservation: attach the confirmed-alive child handle.
    ///
    /// Returns the child back if the reservation disappeared in the meantime
    /// (a racing `stop` self-healed it); the caller decides what to do with
    /// the orphaned process.
    pub(crate) fn attach(
        &mut self,
        server_num: u32,
        pid: u32,
        child: Child,
    ) -> std::result::Result<(), Child> {
        match self.slots.get_mut(&server_num) {
            Some(slot) => {
                if matches!(slot.state, SlotState::Active { .. }) {
                    warn!(server_num, "Attach over an already active slot");
                }
                let started_at = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                slot.state = SlotState::Active {
                    child,
                    pid,
                    started_at,
                };
                Ok(())
            }
            None => Err(child),
        }
    }

    /// Remove the slot entirely, handing ownership of its pieces back.
    pub(crate) fn remove(&mut self, server_num: u32) -> Option<RemovedSlot> {
        self.slots.remove(&server_num).map(|slot| match slot.state {
            SlotState::Reserving => RemovedSlot {
                child: None,
                pid: None,
                capture: slot.capture,
            },
            SlotState::Active { child, pid, .. } => RemovedSlot {
                child: Some(child),
                pid: Some(pid),
                capture: slot.capture,
            },
        })
    }

    /// Remove every slot, for exit cleanup.
    pub(crate) fn drain_all(&mut self) -> Vec<(u32, RemovedSlot)> {
        let nums: Vec<u32> = self.slots.keys().copied().collect();
        nums.into_iter()
            .filter_map(|n| self.remove(n).map(|s| (n, s)))
            .collect()
    }

    pub(crate) fn state(&self, server_num: u32) -> SlotQuery {
        match self.slots.get(&server_num) {
            None => SlotQuery::Absent,
            Some(slot) => match slot.state {
                SlotState::Reserving => SlotQuery::Reserving,
                SlotState::Active { .. } => SlotQuery::Active,
            },
        }
    }

    /// Whether this server number is tracked (reserving or active).
    pub(crate) fn is_tracked(&self, server_num: u32) -> bool {
        self.slots.contains_key(&server_num)
    }

    /// Whether any slot at all is tracked.
    pub(crate) fn any_tracked(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Snapshot of the tracked server numbers.
    pub(crate) fn tracked_server_nums(&self) -> Vec<u32> {
        self.slots.keys().copied().collect()
    }

    /// Run `f` against the capture sink of a tracked slot.
    ///
    /// Returns `None` if the slot is not tracked. Used to wire the child's
    /// stdio to the capture without moving it out of the registry.
    pub(crate) fn with_capture<T>(
        &self,
        server_num: u32,
        f: impl FnOnce(&OutputCapture) -> T,
    ) -> Option<T> {
        self.slots.get(&server_num).map(|slot| f(&slot.capture))
    }

    /// Capture file path for a tracked slot, for diagnostics and tests.
    pub(crate) fn capture_path(&self, server_num: u32) -> Option<std::path::PathBuf> {
        self.slots
            .get(&server_num)
            .map(|slot| slot.capture.path().to_path_buf())
    }

    /// Snapshots of every committed session.
    pub(crate) fn active_sessions(&self) -> Vec<SessionInfo> {
        self.slots
            .iter()
            .filter_map(|(n, slot)| match slot.state {
                SlotState::Active {
                    pid, started_at, ..
                } => Some(SessionInfo::new(*n, pid, started_at)),
                SlotState::Reserving => None,
            })
            .collect()
    }

    /// Drop slots whose process exited on its own; returns their numbers.
    ///
    /// Reserving slots are left alone, their `start` call is still inside the
    /// crash-detection window.
    pub(crate) fn sweep_exited(&mut self) -> Vec<u32> {
        let mut dead = Vec::new();
        for (n, slot) in &mut self.slots {
            if let SlotState::Active { child, .. } = &mut slot.state {
                match child.try_wait() {
                    Ok(Some(_)) | Err(_) => dead.push(*n),
                    Ok(None) => {}
                }
            }
        }
        for n in &dead {
            debug!(server_num = n, "Sweeping exited session");
            self.slots.remove(n);
        }
        dead
    }
}

// Drop is not async, so the graceful escalation is not available here.
// Best-effort forced kill of anything still tracked; normal teardown goes
// through XvfbManager::stop or a CleanupGuard.
impl Drop for SessionRegistry {
    fn drop(&mut self) {
        for (n, slot) in self.slots.drain() {
            if let SlotState::Active { pid, .. } = slot.state {
                debug!(server_num = n, pid, "Registry dropped with live session, force killing");
                crate::shutdown::force_kill_pid(pid);
            }
        }
    }
}
