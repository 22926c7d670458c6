//! Display-string derivation and the `DISPLAY` environment contract.

/// Environment variable consumers read to locate their X display.
pub const DISPLAY_ENV: &str = "DISPLAY";

/// Derive the `DISPLAY` string that references a given server number.
///
/// Always uses screen 0, matching the screen the session is started with.
pub fn display_str_for_server_num(server_num: u32) -> String {
    format!(":{server_num}.0")
}
