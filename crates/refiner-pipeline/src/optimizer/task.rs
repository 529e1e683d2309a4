//! Content snapshots of the file being optimized.

use std::fs::{self, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};

use refiner_config::RollbackScope;

use crate::error::RestoreError;

/// A file owned by one worker, with its rollback targets.
#[derive(Debug)]
pub struct FileTask {
    path: PathBuf,
    original: Vec<u8>,
    checkpoint: Vec<u8>,
    permissions: Permissions,
}

impl FileTask {
    /// Reads the file once to capture its original content.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::Read`] when the file or its metadata cannot be
    /// read; without a snapshot there is nothing to roll back to.
    pub fn capture(path: impl Into<PathBuf>) -> Result<Self, RestoreError> {
        let path = path.into();
        let original = fs::read(&path).map_err(|err| RestoreError::read(path.clone(), err))?;
        let permissions = fs::metadata(&path)
            .map_err(|err| RestoreError::read(path.clone(), err))?
            .permissions();
        Ok(Self {
            checkpoint: original.clone(),
            path,
            original,
            permissions,
        })
    }

    /// Resolved location on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Content before any pass ran.
    #[must_use]
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    /// Content after the most recent validated pass.
    #[must_use]
    pub fn checkpoint(&self) -> &[u8] {
        &self.checkpoint
    }

    /// Reads the current on-disk content.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::Read`] when the file cannot be read.
    pub fn current(&self) -> Result<Vec<u8>, RestoreError> {
        fs::read(&self.path).map_err(|err| RestoreError::read(self.path.clone(), err))
    }

    /// Records the current content as the last validated state.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::Read`] when the file cannot be read.
    pub fn take_checkpoint(&mut self) -> Result<(), RestoreError> {
        self.checkpoint = self.current()?;
        Ok(())
    }

    /// Content a rollback under `scope` restores.
    #[must_use]
    pub fn rollback_target(&self, scope: RollbackScope) -> &[u8] {
        match scope {
            RollbackScope::WholeFile => &self.original,
            RollbackScope::SinceLastSuccess => &self.checkpoint,
        }
    }

    /// Atomically rewrites the file with the content `scope` selects.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::Write`] when the temporary file cannot be
    /// written or renamed over the target.
    pub fn restore(&self, scope: RollbackScope) -> Result<(), RestoreError> {
        write_atomic(&self.path, self.rollback_target(scope), &self.permissions)
    }
}

/// Writes through a sibling temporary file, then renames it into place.
fn write_atomic(path: &Path, content: &[u8], fallback: &Permissions) -> Result<(), RestoreError> {
    let write_error = |err: std::io::Error| RestoreError::write(path.to_path_buf(), err);
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path).map_or_else(|_| fallback.clone(), |meta| meta.permissions());

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(write_error)?;
    temp_file.write_all(content).map_err(write_error)?;
    temp_file.as_file().sync_all().map_err(write_error)?;
    temp_file
        .as_file()
        .set_permissions(permissions)
        .map_err(write_error)?;
    temp_file
        .persist(path)
        .map_err(|err| write_error(err.error))?;
    Ok(())
}
