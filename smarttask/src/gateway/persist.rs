//! On-disk persistence for the current session.
//!
//! Lets successive runs of the CLI share one login. The file holds the
//! versioned postcard encoding from [`smarttask_proto::codec`].

use std::io;
use std::path::{Path, PathBuf};

use smarttask_proto::auth::Session;
use smarttask_proto::codec::{self, CodecError};

/// Errors reading or writing the session file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem access failed.
    #[error("session file {path}: {source}")]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file exists but does not hold a readable session.
    #[error("session file is unreadable: {0}")]
    Codec(#[from] CodecError),
}

/// Location of a persisted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Creates a handle for `path`. Nothing is touched on disk yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing file means no session.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be read or decoded.
    pub fn load(&self) -> Result<Option<Session>, PersistError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(codec::decode_session(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Writes `session`, replacing any previous file.
    ///
    /// The bytes go to a sibling temp file first and are renamed into place,
    /// so a crash never leaves a half-written session behind.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if encoding or any filesystem step fails.
    pub fn save(&self, session: &Session) -> Result<(), PersistError> {
        let bytes = codec::encode_session(session)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| self.io_error(e))?;
        restrict_permissions(&tmp).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    /// Deletes the stored session. A missing file is fine.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), PersistError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
