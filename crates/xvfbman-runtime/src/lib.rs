//! Process runtime for xvfbman.
//!
//! This crate supervises external Xvfb display server processes: it allocates
//! a display slot (server number), launches a backing process bound to that
//! slot, watches for early crashes, and tears the process down with a
//! graceful-then-forced termination sequence on request or at program exit.
//!
//! The main entry point is [`XvfbManager`]; construct one per host
//! application and drive every operation through it.

mod capture;
mod command;
mod cleanup;
mod manager;
mod registry;
mod shutdown;
mod types;

// Re-export the supervisor API
pub use manager::{
    DEFAULT_RANGE_FIRST, DEFAULT_RANGE_LAST, DEFAULT_XVFB_PATH, XvfbManager,
};

// Re-export the exit-cleanup guard
pub use cleanup::CleanupGuard;

// Re-export session introspection types
pub use types::SessionInfo;

// Re-export the escalating shutdown primitive for direct use if needed
pub use shutdown::shutdown_child;

// Re-export core types so most callers need only this crate
pub use xvfbman_core::{
    DISPLAY_ENV, Result, ScreenConfig, XvfbError, display_str_for_server_num,
};
