// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build artifact installation.
//!
//! Copies a single file or an entire directory tree into place. Directory
//! copies merge into whatever already lives at the destination: files that
//! collide are overwritten, and everything else is left alone.

use ignore::WalkBuilder;
use std::{
    fs::{copy, metadata, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Copy file or directory tree from source to destination.
///
/// Missing parent directories of the destination are created. Returns the
/// number of files copied.
///
/// # Errors
///
/// - Return [`CopyError::MissingSource`] if source does not exist.
/// - Return [`CopyError::CreateDir`] if a destination directory cannot be
///   created.
/// - Return [`CopyError::CopyFile`] if a file cannot be copied.
/// - Return [`CopyError::Walk`] if source tree cannot be traversed.
#[instrument(skip(source, destination), level = "debug")]
pub fn copy_artifact(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<usize> {
    let (source, destination) = (source.as_ref(), destination.as_ref());
    if !source.exists() {
        return Err(CopyError::MissingSource(source.to_path_buf()));
    }

    if let Some(parent) = destination.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        make_dir(parent)?;
    }

    let copied = if source.is_file() {
        copy_file(source, destination)?;
        1
    } else {
        copy_tree(source, destination)?
    };

    info!(
        "copied {:?} to {:?}",
        source.display(),
        destination.display()
    );
    Ok(copied)
}

fn copy_tree(source: &Path, destination: &Path) -> Result<usize> {
    let mut copied = 0;

    // INVARIANT: Copy hidden and ignored files too.
    let walker = WalkBuilder::new(source).standard_filters(false).build();
    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path());
        let target = destination.join(relative);

        match entry.file_type() {
            Some(kind) if kind.is_dir() => make_dir(&target)?,
            _ => {
                debug!("copy {:?}", relative.display());
                copy_file(entry.path(), &target)?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    copy(source, destination).map_err(|err| CopyError::CopyFile {
        source: err,
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
    })?;

    // Read-only copies cannot be reopened for writing, so modification time
    // is kept on a best effort basis.
    let stamped = metadata(source)
        .and_then(|meta| meta.modified())
        .and_then(|modified| {
            OpenOptions::new()
                .write(true)
                .open(destination)?
                .set_modified(modified)
        });
    if let Err(error) = stamped {
        debug!(
            "cannot preserve modification time of {:?}: {error}",
            destination.display()
        );
    }

    Ok(())
}

fn make_dir(path: &Path) -> Result<()> {
    mkdirp::mkdirp(path).map_err(|err| CopyError::CreateDir {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Artifact copy error types.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// Source path does not exist.
    #[error("source path {:?} does not exist", .0.display())]
    MissingSource(PathBuf),

    /// Destination directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    CopyFile {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Source tree cannot be traversed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),
}

/// Friendly result alias :3
type Result<T, E = CopyError> = std::result::Result<T, E>;
