//! Command builder for the Xvfb process.
//!
//! Xvfb is invoked as `Xvfb :<n> -screen 0 <geometry>` with both output
//! streams redirected to the session's capture file.

use std::io;
use std::path::Path;

use tokio::process::{Child, Command};
use tracing::debug;
use xvfbman_core::ScreenConfig;

use crate::capture::OutputCapture;

/// Build and spawn an Xvfb process bound to `server_num`.
///
/// Both stdout and stderr are redirected to `capture` so that early-exit
/// diagnostics can be read back.
///
/// # Errors
///
/// Returns the underlying OS error if the capture handles cannot be cloned
/// or the process fails to spawn (missing binary, permissions, ...).
pub(crate) fn spawn_xvfb(
    xvfb_path: &Path,
    server_num: u32,
    screen: &ScreenConfig,
    capture: &OutputCapture,
) -> io::Result<Child> {
    let (out, err) = capture.stdio()?;

    let mut cmd = Command::new(xvfb_path);
    cmd.arg(format!(":{server_num}"))
        .arg("-screen")
        .arg("0")
        .arg(screen.to_string())
        .stdout(out)
        .stderr(err);

    debug!(
        binary = %xvfb_path.display(),
        server_num,
        screen = %screen,
        "Spawning Xvfb"
    );

    cmd.spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    #[cfg(unix)]
    fn write_mock_binary(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("Xvfb");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn spawns_with_display_and_screen_args() {
        let dir = TempDir::new().unwrap();
        // Echo the arguments so we can verify the invocation contract
        let binary = write_mock_binary(&dir, "echo \"$@\"");
        let capture = OutputCapture::new().unwrap();

        let mut child = spawn_xvfb(&binary, 12, &ScreenConfig::default(), &capture).unwrap();
        let status = child.wait().await.unwrap();
        assert!(status.success());

        assert_eq!(capture.read_from_start().trim(), ":12 -screen 0 1280x720x24");
    }

    #[tokio::test]
    async fn spawn_fails_for_missing_binary() {
        let capture = OutputCapture::new().unwrap();
        let result = spawn_xvfb(
            Path::new("/nonexistent/path/Xvfb"),
            1,
            &ScreenConfig::default(),
            &capture,
        );
        assert!(result.is_err());
    }
}
