//! Core domain types for xvfbman.
//!
//! This crate contains the types shared by every xvfbman adapter: the error
//! enum, screen geometry, and display-string derivation. It has no OS-level
//! or process-spawning concerns; those live in `xvfbman-runtime`.

pub mod display;
pub mod error;
pub mod screen;
pub mod test_utils;

pub use display::{DISPLAY_ENV, display_str_for_server_num};
pub use error::{Result, XvfbError};
pub use screen::{ScreenConfig, ScreenConfigError};
