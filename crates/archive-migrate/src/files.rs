//! Writing generated definitions to disk.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{MigrateError, Result};

/// Destination for generated definition files.
pub trait FileSink: Send {
    /// Write `contents` to a new file at `path`.
    ///
    /// Returns `false` without touching anything if the file already exists.
    fn make_file(&mut self, path: &Path, contents: &str) -> Result<bool>;

    /// Create `path` and its parents if missing.
    fn make_directory(&mut self, path: &Path) -> Result<()>;
}

/// [`FileSink`] on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl LocalFiles {
    pub fn new() -> Self {
        Self
    }
}

impl FileSink for LocalFiles {
    fn make_file(&mut self, path: &Path, contents: &str) -> Result<bool> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} already exists", path.display());
                return Ok(false);
            }
            Err(e) => return Err(MigrateError::file_write(path, e)),
        };
        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| MigrateError::file_write(path, e))?;
        Ok(true)
    }

    fn make_directory(&mut self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| MigrateError::file_write(path, e))
    }
}
