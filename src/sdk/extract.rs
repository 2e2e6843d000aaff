// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Zip archive extraction.
//!
//! Entries are unpacked into a sibling `.part` directory first, which is only
//! moved onto the target directory once every entry has been written. Thus,
//! an archive that fails to extract never leaves behind a target directory
//! that looks like a finished extraction.

use crate::path::partial_path;

use std::{
    fs::{create_dir_all, remove_dir_all, rename, File},
    io::copy,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

/// Extract all entries of zip archive into target directory.
///
/// Relative entry paths are preserved. Entries whose names would land outside
/// of the target directory are skipped. Returns number of extracted files.
///
/// The target directory only comes into existence once extraction succeeds,
/// replacing whatever was at that path before. On failure, the staging
/// directory is removed and the target is left untouched.
///
/// # Errors
///
/// - Return [`ExtractError::OpenArchive`] if archive cannot be opened.
/// - Return [`ExtractError::Corrupt`] if archive cannot be read as zip.
/// - Return [`ExtractError::WriteEntry`] if an entry cannot be written.
/// - Return [`ExtractError::Publish`] if staged tree cannot replace target.
#[instrument(skip(archive, target), level = "debug")]
pub fn extract_zip(archive: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<usize> {
    let (archive, target) = (archive.as_ref(), target.as_ref());
    info!("extract {:?} into {:?}", archive.display(), target.display());

    let staging = partial_path(target);
    if staging.exists() {
        debug!("clear stale staging directory {:?}", staging.display());
        remove_dir_all(&staging).map_err(|err| ExtractError::WriteEntry {
            source: err,
            path: staging.clone(),
        })?;
    }

    let extracted = match unpack(archive, &staging) {
        Ok(extracted) => extracted,
        Err(error) => {
            if let Err(cleanup) = remove_dir_all(&staging) {
                debug!("staging directory not removed: {cleanup}");
            }
            return Err(error);
        }
    };

    if target.exists() {
        remove_dir_all(target).map_err(|err| ExtractError::Publish {
            source: err,
            path: target.to_path_buf(),
        })?;
    }
    rename(&staging, target).map_err(|err| ExtractError::Publish {
        source: err,
        path: target.to_path_buf(),
    })?;

    info!("extracted {extracted} files");
    Ok(extracted)
}

fn unpack(archive: &Path, target: &Path) -> Result<usize> {
    create_dir_all(target).map_err(|err| ExtractError::WriteEntry {
        source: err,
        path: target.to_path_buf(),
    })?;

    let file = File::open(archive).map_err(|err| ExtractError::OpenArchive {
        source: err,
        path: archive.to_path_buf(),
    })?;
    let mut zip = ZipArchive::new(file).map_err(|err| ExtractError::Corrupt {
        source: err,
        path: archive.to_path_buf(),
    })?;

    let mut extracted = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|err| ExtractError::Corrupt {
            source: err,
            path: archive.to_path_buf(),
        })?;

        // INVARIANT: Never write outside of target directory.
        let Some(relative) = entry.enclosed_name() else {
            warn!("skip unsafe archive entry {:?}", entry.name());
            continue;
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            create_dir_all(&out_path).map_err(|err| ExtractError::WriteEntry {
                source: err,
                path: out_path.clone(),
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            create_dir_all(parent).map_err(|err| ExtractError::WriteEntry {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        debug!("extract {:?}", out_path.display());
        let mut out_file = File::create(&out_path).map_err(|err| ExtractError::WriteEntry {
            source: err,
            path: out_path.clone(),
        })?;
        copy(&mut entry, &mut out_file).map_err(|err| ExtractError::WriteEntry {
            source: err,
            path: out_path.clone(),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                    .map_err(|err| ExtractError::WriteEntry {
                        source: err,
                        path: out_path.clone(),
                    })?;
            }
        }

        extracted += 1;
    }

    Ok(extracted)
}

/// Extraction error types.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Archive file cannot be opened.
    #[error("failed to open archive {:?}", path.display())]
    OpenArchive {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Archive is not a readable zip file.
    #[error("archive {:?} is corrupt", path.display())]
    Corrupt {
        #[source]
        source: zip::result::ZipError,
        path: PathBuf,
    },

    /// Fully extracted tree cannot be moved onto target directory.
    #[error("failed to move extracted tree onto {:?}", path.display())]
    Publish {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Extracted entry cannot be written.
    #[error("failed to write extracted entry {:?}", path.display())]
    WriteEntry {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = ExtractError> = std::result::Result<T, E>;
