//! On-disk persistence of the credential.
//!
//! The credential is stored as TOML in `{storage_path}/credentials.toml`.
//! Only the token set is written, never the computed expiry or the
//! authenticated flag: a loaded credential always goes through a refresh
//! before it is trusted.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};

/// File name of the persisted credential under the storage directory.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.toml";

/// Reads and writes the credential file.
///
/// An empty storage path disables persistence: `save` and `remove` do
/// nothing and `load` returns an empty credential. Clones share a write lock
/// so concurrent saves never interleave on the temp file. The lock also
/// records the newest store generation written by
/// [`save_generation`](Self::save_generation).
#[derive(Debug, Clone)]
pub struct CredentialFile {
    dir: PathBuf,
    written: Arc<Mutex<Option<u64>>>,
}

impl CredentialFile {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: storage_path.into(),
            written: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the full path of the credential file, or `None` when disabled.
    pub fn path(&self) -> Option<PathBuf> {
        if self.dir.as_os_str().is_empty() {
            None
        } else {
            Some(self.dir.join(CREDENTIALS_FILE_NAME))
        }
    }

    /// Writes the credential atomically (temp file + rename).
    pub fn save(&self, credential: &Credential) -> AuthResult<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        let content = self.prepare(credential)?;
        let _guard = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        self.replace(&path, &content)
    }

    /// Writes a snapshot taken at store `generation`, unless a newer
    /// snapshot was already written.
    ///
    /// Returns whether the file was written.
    pub fn save_generation(&self, credential: &Credential, generation: u64) -> AuthResult<bool> {
        let Some(path) = self.path() else {
            return Ok(false);
        };
        let content = self.prepare(credential)?;

        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if written.is_some_and(|newest| newest >= generation) {
            debug!(generation, "skipping stale credentials snapshot");
            return Ok(false);
        }
        self.replace(&path, &content)?;
        *written = Some(generation);
        Ok(true)
    }

    fn prepare(&self, credential: &Credential) -> AuthResult<String> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AuthError::persistence(format!(
                "failed to create credentials directory {}",
                self.dir.display()
            ))
            .with_source(e)
        })?;

        toml::to_string(credential)
            .map_err(|e| AuthError::persistence("failed to serialize credentials").with_source(e))
    }

    /// Caller holds the write lock.
    fn replace(&self, path: &Path, content: &str) -> AuthResult<()> {
        let temp_path = path.with_extension("toml.tmp");
        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            AuthError::persistence(format!(
                "failed to write credentials file {}",
                temp_path.display()
            ))
            .with_source(e)
        })?;

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            AuthError::persistence(format!(
                "failed to replace credentials file {}",
                path.display()
            ))
            .with_source(e)
        })?;

        debug!(path = %path.display(), "saved credentials");
        Ok(())
    }

    /// Reads the credential, falling back to an empty one.
    ///
    /// A missing file is normal on first start. A malformed file is logged
    /// and ignored so startup falls through to interactive login.
    pub fn load(&self) -> Credential {
        let Some(path) = self.path() else {
            return Credential::default();
        };

        match read_credential(&path) {
            Ok(Some(credential)) => {
                info!(path = %path.display(), "loaded persisted credentials");
                credential
            }
            Ok(None) => {
                debug!(path = %path.display(), "no persisted credentials");
                Credential::default()
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable credentials file");
                Credential::default()
            }
        }
    }

    /// Deletes the credential file if it exists.
    pub fn remove(&self) -> AuthResult<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        *written = None;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed credentials file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::persistence(format!(
                "failed to remove credentials file {}",
                path.display()
            ))
            .with_source(e)),
        }
    }
}

fn read_credential(path: &Path) -> AuthResult<Option<Credential>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AuthError::persistence(format!(
                "failed to read credentials file {}",
                path.display()
            ))
            .with_source(e));
        }
    };

    toml::from_str(&content).map(Some).map_err(|e| {
        AuthError::persistence(format!(
            "failed to parse credentials file {}",
            path.display()
        ))
        .with_source(e)
    })
}

/// Creates (or truncates) a file readable only by the owner on Unix.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}
