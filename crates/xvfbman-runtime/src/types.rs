//! Shared types for session management.

use serde::Serialize;
use xvfbman_core::display_str_for_server_num;

/// Information about an active Xvfb session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Server number the session is bound to
    pub server_num: u32,
    /// Process ID of the supervised Xvfb
    pub pid: u32,
    /// `DISPLAY` string referencing this session
    pub display: String,
    /// Unix timestamp when the session was committed
    pub started_at: u64,
}

impl SessionInfo {
    /// Create a new `SessionInfo`.
    pub fn new(server_num: u32, pid: u32, started_at: u64) -> Self {
        Self {
            server_num,
            pid,
            display: display_str_for_server_num(server_num),
            started_at,
        }
    }
}
