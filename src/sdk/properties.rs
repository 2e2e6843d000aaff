// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project-local SDK configuration.
//!
//! Gradle locates the Android SDK through a `local.properties` file at the
//! top-level of a project. The file is regenerated from scratch every time,
//! and contains exactly one key: `sdk.dir`.
//!
//! # Escaping
//!
//! Property files treat the backslash as an escape character. So, on hosts
//! whose path separator is a backslash, every backslash of the SDK path is
//! doubled before it is written out.

use std::{
    fs::write,
    path::{absolute, Path, PathBuf},
};
use tracing::{info, instrument};

/// Name of the generated properties file.
pub const LOCAL_PROPERTIES: &str = "local.properties";

/// Path separator style of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// Backslash separated paths, i.e., Windows.
    Backslash,

    /// Forward slash separated paths.
    Slash,
}

impl Separator {
    /// Separator style of the current host.
    pub fn host() -> Self {
        if std::path::MAIN_SEPARATOR == '\\' {
            Self::Backslash
        } else {
            Self::Slash
        }
    }
}

/// Render content of `local.properties` for given SDK path.
pub fn render_sdk_dir(sdk: &str, separator: Separator) -> String {
    match separator {
        Separator::Backslash => format!("sdk.dir={}", sdk.replace('\\', "\\\\")),
        Separator::Slash => format!("sdk.dir={sdk}"),
    }
}

/// Write `local.properties` recording SDK path into project.
///
/// Both paths are resolved to absolute canonical form first. Paths are taken
/// literally, so any shell expansion is the caller's job. The project must contain a file matching the
/// `marker` glob pattern at its top-level. Any existing `local.properties` is
/// overwritten. Returns path of the written file.
///
/// Nothing is written if validation fails.
///
/// # Errors
///
/// - Return [`ConfigureError::SdkMissing`] if SDK path does not exist.
/// - Return [`ConfigureError::SdkNotDirectory`] if SDK path is not a directory.
/// - Return [`ConfigureError::ProjectMissing`] if project path does not exist.
/// - Return [`ConfigureError::MarkerMissing`] if no marker file is found.
/// - Return [`ConfigureError::InvalidMarker`] if marker pattern is malformed.
/// - Return [`ConfigureError::WriteProperties`] if file cannot be written.
#[instrument(skip(sdk, project), level = "debug")]
pub fn write_local_properties(
    sdk: impl AsRef<Path>,
    project: impl AsRef<Path>,
    marker: &str,
) -> Result<PathBuf> {
    let sdk = resolve(sdk.as_ref()).map_err(ConfigureError::SdkMissing)?;
    if !sdk.is_dir() {
        return Err(ConfigureError::SdkNotDirectory(sdk));
    }

    let project = resolve(project.as_ref()).map_err(ConfigureError::ProjectMissing)?;
    if !has_marker(&project, marker)? {
        return Err(ConfigureError::MarkerMissing {
            marker: marker.to_string(),
            project,
        });
    }

    let sdk_str = sdk.to_string_lossy();
    let content = render_sdk_dir(sdk_str.as_ref(), Separator::host());
    let properties = project.join(LOCAL_PROPERTIES);
    write(&properties, content.as_bytes()).map_err(|err| ConfigureError::WriteProperties {
        source: err,
        path: properties.clone(),
    })?;

    info!("generated {:?}", properties.display());
    info!("sdk path: {:?}", sdk.display());
    info!("project path: {:?}", project.display());

    Ok(properties)
}

// Canonicalize an existing path, or hand back its absolute form if missing.
fn resolve(path: impl AsRef<Path>) -> std::result::Result<PathBuf, PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(absolute(path).unwrap_or_else(|_| path.to_path_buf()));
    }

    dunce::canonicalize(path).map_err(|_| path.to_path_buf())
}

fn has_marker(project: &Path, marker: &str) -> Result<bool> {
    let pattern = format!(
        "{}/{marker}",
        glob::Pattern::escape(project.to_string_lossy().as_ref())
    );
    let mut matches = glob::glob(&pattern).map_err(|err| ConfigureError::InvalidMarker {
        source: err,
        marker: marker.to_string(),
    })?;

    Ok(matches.any(|entry| entry.is_ok()))
}

/// SDK configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigureError {
    /// SDK path does not exist.
    #[error("sdk path {:?} does not exist", .0.display())]
    SdkMissing(PathBuf),

    /// SDK path exists, but is not a directory.
    #[error("sdk path {:?} is not a directory", .0.display())]
    SdkNotDirectory(PathBuf),

    /// Project path does not exist.
    #[error("project path {:?} does not exist", .0.display())]
    ProjectMissing(PathBuf),

    /// Project does not contain build tool marker file.
    #[error("no {marker} file found in {:?}", project.display())]
    MarkerMissing { marker: String, project: PathBuf },

    /// Marker is not a valid glob pattern.
    #[error("invalid marker pattern {marker:?}")]
    InvalidMarker {
        #[source]
        source: glob::PatternError,
        marker: String,
    },

    /// Properties file cannot be written.
    #[error("failed to write {:?}", path.display())]
    WriteProperties {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = ConfigureError> = std::result::Result<T, E>;
