//! Moving single files into place.
//!
//! The [`Mover`] creates missing parent folders, renames when source and
//! destination share a volume, and otherwise copies, verifies the copy's size,
//! and only then removes the source. Files inside protected folders are refused
//! before anything on disk is touched.

use crate::error::{OrganizeError, OrganizeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One performed move, enough to reverse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAction {
    /// Where the file was before the move.
    pub original_path: PathBuf,
    /// Where the file is now.
    pub final_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    /// Whether an existing file at `final_path` was overwritten.
    #[serde(default)]
    pub replaced: bool,
}

/// Performs moves, refusing files under protected folders.
#[derive(Debug, Clone, Default)]
pub struct Mover {
    protected: Vec<PathBuf>,
}

impl Mover {
    /// Creates a mover that refuses files under any of `protected_dirs`.
    pub fn new(protected_dirs: &[PathBuf]) -> Self {
        let protected = protected_dirs
            .iter()
            .map(|dir| fs::canonicalize(dir).unwrap_or_else(|_| dir.clone()))
            .collect();
        Self { protected }
    }

    /// Returns true if `path` lies inside a protected folder.
    pub fn is_protected(&self, path: &Path) -> bool {
        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.protected
            .iter()
            .any(|dir| resolved.starts_with(dir) || path.starts_with(dir))
    }

    /// Moves `source` to `destination` and describes what happened.
    ///
    /// Without `overwrite`, an existing destination is an error and nothing moves.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::mover::Mover;
    /// use std::path::Path;
    ///
    /// let mover = Mover::new(&[]);
    /// let action = mover
    ///     .move_file(Path::new("/tmp/in/a.pdf"), Path::new("/tmp/out/Documents/a.pdf"), false)
    ///     .expect("move failed");
    /// println!("moved to {}", action.final_path.display());
    /// ```
    pub fn move_file(
        &self,
        source: &Path,
        destination: &Path,
        overwrite: bool,
    ) -> OrganizeResult<MoveAction> {
        if self.is_protected(source) {
            return Err(OrganizeError::protected(source));
        }

        let replaced = destination.exists();
        relocate(source, destination, overwrite)?;

        debug!(
            from = %source.display(),
            to = %destination.display(),
            replaced,
            "Moved file"
        );

        Ok(MoveAction {
            original_path: source.to_path_buf(),
            final_path: destination.to_path_buf(),
            timestamp: Utc::now(),
            replaced,
        })
    }
}

/// Moves a file with no protection check, creating parent folders as needed.
pub(crate) fn relocate(source: &Path, destination: &Path, overwrite: bool) -> OrganizeResult<()> {
    if !source.is_file() {
        return Err(OrganizeError::io(
            "read",
            source,
            io::Error::new(io::ErrorKind::NotFound, "source file not found"),
        ));
    }

    if !overwrite && destination.exists() {
        return Err(OrganizeError::io(
            "move to",
            destination,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
        ));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| OrganizeError::io("create", parent, e))?;
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            info!(
                from = %source.display(),
                to = %destination.display(),
                "Rename crosses volumes, copying instead"
            );
            copy_then_remove(source, destination)
        }
        Err(e) => Err(OrganizeError::io("move", source, e)),
    }
}

/// Copies `source` to `destination`, checks the size, then removes `source`.
///
/// The source is left untouched when the copy cannot be verified.
pub(crate) fn copy_then_remove(source: &Path, destination: &Path) -> OrganizeResult<()> {
    let source_size = fs::metadata(source)
        .map_err(|e| OrganizeError::io("read", source, e))?
        .len();

    // A partial copy must not be left behind, but a file that was already
    // there is not ours to remove.
    let existed = destination.exists();
    let discard_copy = || {
        if !existed {
            let _ = fs::remove_file(destination);
        }
    };

    if let Err(e) = fs::copy(source, destination) {
        discard_copy();
        return Err(OrganizeError::io("copy", source, e));
    }

    let copied_size = match fs::metadata(destination) {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            discard_copy();
            return Err(OrganizeError::io("verify", destination, e));
        }
    };
    if copied_size != source_size {
        discard_copy();
        return Err(OrganizeError::io(
            "verify",
            destination,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "copy verification failed: source {} bytes, copy {} bytes",
                    source_size, copied_size
                ),
            ),
        ));
    }

    if let Err(e) = fs::remove_file(source) {
        discard_copy();
        return Err(OrganizeError::io("remove", source, e));
    }

    Ok(())
}
