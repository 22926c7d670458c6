//! Per-session output capture.
//!
//! Each slot owns a uniquely named temporary file that receives the
//! supervised process's combined stdout/stderr. The file is only ever read
//! back when diagnosing an early exit, and is deleted when the slot is
//! released on any path.

use std::fs;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tempfile::NamedTempFile;
use tracing::debug;

/// Combined stdout/stderr sink for one supervised process.
///
/// Dropping the capture deletes the underlying file.
pub(crate) struct OutputCapture {
    file: NamedTempFile,
}

impl OutputCapture {
    /// Create a fresh capture file in the system temp directory.
    pub(crate) fn new() -> io::Result<Self> {
        let file = NamedTempFile::new()?;
        debug!(path = %file.path().display(), "Created output capture");
        Ok(Self { file })
    }

    /// Path of the underlying file.
    pub(crate) fn path(&self) -> &Path {
        self.file.path()
    }

    /// A pair of `Stdio` handles writing to this capture, for wiring up the
    /// child's stdout and stderr.
    pub(crate) fn stdio(&self) -> io::Result<(Stdio, Stdio)> {
        let out = self.file.as_file().try_clone()?;
        let err = self.file.as_file().try_clone()?;
        Ok((Stdio::from(out), Stdio::from(err)))
    }

    /// Read everything the process wrote, from the start of the file.
    ///
    /// A read failure is substituted with a marker string rather than
    /// propagated; the caller is already on a failure path and the output is
    /// purely diagnostic.
    pub(crate) fn read_from_start(&self) -> String {
        fs::read_to_string(self.path()).unwrap_or_else(|e| {
            debug!(path = %self.path().display(), "Could not read capture: {}", e);
            format!(
                "ERROR: Could not read output file \"{}\"",
                self.path().display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_back_what_was_written() {
        let capture = OutputCapture::new().unwrap();
        capture
            .file
            .as_file()
            .try_clone()
            .unwrap()
            .write_all(b"some diagnostic output")
            .unwrap();
        assert_eq!(capture.read_from_start(), "some diagnostic output");
    }

    #[test]
    fn file_removed_on_drop() {
        let capture = OutputCapture::new().unwrap();
        let path = capture.path().to_path_buf();
        assert!(path.exists());
        drop(capture);
        assert!(!path.exists());
    }

    #[test]
    fn stdio_handles_share_the_file() {
        let capture = OutputCapture::new().unwrap();
        let (out, err) = capture.stdio().unwrap();
        drop(out);
        drop(err);
        // Handles are independent clones; the capture itself still works
        assert_eq!(capture.read_from_start(), "");
    }
}
