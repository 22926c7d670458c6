//! Error types for Xvfb session management.
//!
//! This module provides a unified error type for all session operations,
//! keeping error plumbing out of the runtime modules.

use thiserror::Error;

/// Errors that can occur while starting or managing Xvfb sessions.
#[derive(Debug, Error)]
pub enum XvfbError {
    /// A session on this server number is already managed by this registry.
    #[error("Tried to start Xvfb on server num {server_num}, but one is already open")]
    AlreadyActive { server_num: u32 },

    /// The display address is already bound by a server outside this registry.
    ///
    /// Classified from the captured Xvfb output when the process exits inside
    /// the crash-detection window with the contention marker present.
    #[error(
        "Failed to start Xvfb on {server_num}. Exit code {exit_code}. \
         Server is already active for display :{server_num}.0"
    )]
    DisplayInUse { server_num: u32, exit_code: i32 },

    /// The Xvfb process could not be spawned at all.
    #[error("Failed to spawn Xvfb on :{server_num}: {source}")]
    SpawnFailed {
        server_num: u32,
        #[source]
        source: std::io::Error,
    },

    /// The Xvfb process exited inside the crash-detection window for a reason
    /// other than display contention. Carries the full captured output.
    #[error("Failed to start Xvfb on {server_num}. Exit code {exit_code:?}. Output:\n{output}")]
    StartupFailed {
        server_num: u32,
        exit_code: Option<i32>,
        output: String,
    },

    /// Every server number in the requested range was in use.
    #[error(
        "Failed to start an Xvfb session on any server num in range \
         {first} --> {last} inclusive. All were in use"
    )]
    RangeExhausted { first: u32, last: u32 },
}

impl XvfbError {
    /// True for failures that mean "this server number is taken, try the
    /// next one" rather than a genuine launch defect.
    pub fn is_slot_contention(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive { .. } | Self::DisplayInUse { .. }
        )
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, XvfbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_active_message_embeds_server_num() {
        let err = XvfbError::AlreadyActive { server_num: 42 };
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn startup_failed_message_embeds_output() {
        let err = XvfbError::StartupFailed {
            server_num: 7,
            exit_code: Some(1),
            output: "fatal: something broke".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("fatal: something broke"));
    }

    #[test]
    fn contention_classification() {
        assert!(XvfbError::AlreadyActive { server_num: 1 }.is_slot_contention());
        assert!(
            XvfbError::DisplayInUse {
                server_num: 1,
                exit_code: 1
            }
            .is_slot_contention()
        );
        assert!(
            !XvfbError::RangeExhausted { first: 1, last: 2 }.is_slot_contention()
        );
        assert!(
            !XvfbError::StartupFailed {
                server_num: 1,
                exit_code: None,
                output: String::new()
            }
            .is_slot_contention()
        );
    }
}
