//! Plain-text status file for status bars and shell prompts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ServerResult;

/// Writes the rendered next event to a file, one line.
#[derive(Debug, Clone, Default)]
pub struct StatusFile {
    path: Option<PathBuf>,
}

impl StatusFile {
    /// A status file at `path`, or a disabled one for `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Replaces the file content with `text` and a trailing newline.
    ///
    /// Readers never observe a half-written file. Does nothing when disabled.
    pub fn write(&self, text: &str) -> ServerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, format!("{}\n", text))?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(path = %path.display(), "status file updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use tempfile::TempDir;

    #[test]
    fn writes_line_with_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("next-event");
        let status = StatusFile::new(Some(path.clone()));

        status.write("Standup - 09:30").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Standup - 09:30\n");

        status.write("No events").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "No events\n");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("next-event.txt");
        StatusFile::new(Some(path.clone())).write("x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn disabled_is_noop() {
        let status = StatusFile::default();
        assert!(!status.is_enabled());
        assert!(status.path().is_none());
        status.write("anything").unwrap();
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let err = StatusFile::new(Some(blocker.join("next-event")))
            .write("x")
            .unwrap_err();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
