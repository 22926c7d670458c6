//! Exit cleanup for managed sessions.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::registry::SessionRegistry;
use crate::shutdown::terminate_pid_blocking;

/// RAII guard that stops every managed session when dropped.
///
/// Obtain one from [`crate::XvfbManager::register_exit_cleanup`] and keep it
/// alive until the end of `main`; its `Drop` is the crate's rendition of an
/// at-exit hook. The teardown is synchronous (Drop cannot await), running the
/// same SIGTERM -> SIGKILL escalation by raw PID and deleting each capture
/// file. Already-stopped sessions cost nothing; a second guard over the same
/// manager finds an empty registry.
pub struct CleanupGuard {
    registry: Arc<Mutex<SessionRegistry>>,
}

impl CleanupGuard {
    pub(crate) fn new(registry: Arc<Mutex<SessionRegistry>>) -> Self {
        Self { registry }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let drained = {
            let mut reg = self
                .registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            reg.drain_all()
        };

        if drained.is_empty() {
            return;
        }

        info!(count = drained.len(), "Exit cleanup: stopping managed sessions");
        for (server_num, slot) in drained {
            if let Some(pid) = slot.pid {
                debug!(server_num, pid, "Exit cleanup: terminating Xvfb");
                terminate_pid_blocking(pid);
            }
            // Dropping the slot deletes its capture file; the child handle,
            // if any, is dropped unreaped (the process itself is gone)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::XvfbManager;

    #[test]
    fn dropping_guard_on_empty_registry_is_quiet() {
        let manager = XvfbManager::default();
        let guard = manager.register_exit_cleanup();
        drop(guard);
        assert!(!manager.is_any_active());
    }

    #[test]
    fn two_guards_are_harmless() {
        let manager = XvfbManager::default();
        let first = manager.register_exit_cleanup();
        let second = manager.register_exit_cleanup();
        drop(first);
        drop(second);
    }
}
