// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::{Path, PathBuf};

/// Determine default absolute path to pipeline configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/cheese-sdk/config.toml` as
/// the default absolute path for the pipeline configuration. Does not check if
/// the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("cheese-sdk").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Perform tilde and variable expansion on a path.
///
/// Falls back to the unexpanded path if expansion fails, e.g., an unset
/// variable is referenced.
pub fn expand(path: impl AsRef<Path>) -> PathBuf {
    let raw = path.as_ref().to_string_lossy();
    match shellexpand::full(raw.as_ref()) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => path.as_ref().to_path_buf(),
    }
}

/// Path used to stage a download or extraction before it is moved onto its
/// destination.
pub fn partial_path(path: impl AsRef<Path>) -> PathBuf {
    let mut staged = path.as_ref().as_os_str().to_owned();
    staged.push(".part");
    PathBuf::from(staged)
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
