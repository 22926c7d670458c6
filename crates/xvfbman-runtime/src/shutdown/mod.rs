//! Graceful process teardown.
//!
//! Two strategies:
//! - [`shutdown_child`]: escalating termination for a live `Child` handle
//!   (SIGTERM, bounded poll, SIGKILL, reap)
//! - [`terminate_pid_blocking`] / [`force_kill_pid`]: synchronous best-effort
//!   kills by raw PID, for `Drop` paths where async is unavailable

mod child;
mod pid;

pub use child::shutdown_child;
pub(crate) use pid::{force_kill_pid, terminate_pid_blocking};
