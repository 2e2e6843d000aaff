// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the pipeline configuration file. Every remote URL,
//! local path, and proxy endpoint the pipeline touches lives here, with
//! defaults that build the stock Cheese SDK.
//!
//! # General Layout
//!
//! The configuration is a TOML document composed of four parts: the SDK
//! archive to acquire, network settings, build tool settings, and an ordered
//! listing of repositories to clone, build, and install into the SDK tree.
//! Any part that is left out falls back to its default.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Pipeline configuration layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SDK archive acquisition settings.
    pub sdk: SdkSettings,

    /// Network settings shared by repository clones.
    pub network: NetworkSettings,

    /// Build tool settings.
    pub build: BuildSettings,

    /// Repositories to process in order.
    #[serde(rename = "repository")]
    pub repositories: Vec<RepositorySpec>,
}

impl PipelineConfig {
    /// Load configuration from file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadConfig`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_to_string(path.as_ref())
            .map_err(|err| ConfigError::ReadConfig {
                source: err,
                path: path.as_ref().to_path_buf(),
            })?
            .parse()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sdk: SdkSettings::default(),
            network: NetworkSettings::default(),
            build: BuildSettings::default(),
            repositories: vec![
                RepositorySpec {
                    name: "CheeseStudioCore".into(),
                    url: "https://github.com/cheese-framework/CheeseStudioCore.git".into(),
                    path: PathBuf::from("./git/CheeseStudioCore"),
                    task: "shadowJar".into(),
                    artifact: PathBuf::from("build/libs/core.jar"),
                    install: PathBuf::from("lib/core.jar"),
                    configure_sdk: false,
                },
                RepositorySpec {
                    name: "Cheese".into(),
                    url: "https://github.com/cheese-framework/Cheese.git".into(),
                    path: PathBuf::from("./git/Cheese"),
                    task: "app:release:assembleRelease".into(),
                    artifact: PathBuf::from("app/release/build/outputs/apk/release/js.apk"),
                    install: PathBuf::from("components/project/js.apk"),
                    configure_sdk: true,
                },
            ],
        }
    }
}

impl FromStr for PipelineConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: PipelineConfig =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.sdk.archive = expand_path(&config.sdk.archive)?;
        config.sdk.dir = expand_path(&config.sdk.dir)?;
        for repository in &mut config.repositories {
            repository.path = expand_path(&repository.path)?;
        }

        Ok(config)
    }
}

impl Display for PipelineConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// SDK archive settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SdkSettings {
    /// Remote URL of prebuilt SDK archive.
    pub url: String,

    /// Local path to store downloaded archive at.
    pub archive: PathBuf,

    /// Directory to extract SDK tree into.
    pub dir: PathBuf,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            url: "https://pan.codeocean.net/d/pan/sdk/cheese-sdk-win-x64.zip".into(),
            archive: PathBuf::from("./downloads/cheese-sdk-win-x64.zip"),
            dir: PathBuf::from("./cheese-sdk-win-x64"),
        }
    }
}

/// Network settings.
///
/// An explicit `[network]` table without a proxy key means direct access.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct NetworkSettings {
    /// Proxy to route repository clones through, if any.
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            proxy: Some("http://127.0.0.1:7897".into()),
        }
    }
}

/// Build tool settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Name of build tool wrapper script at top-level of each project.
    pub wrapper: String,

    /// Glob pattern of file marking a directory as a build tool project.
    pub marker: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        let wrapper = if cfg!(windows) { "gradlew.bat" } else { "gradlew" };
        Self {
            wrapper: wrapper.into(),
            marker: "settings.gradle.kts".into(),
        }
    }
}

/// Repository to clone, build, and install into SDK tree.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RepositorySpec {
    /// Display name of repository.
    pub name: String,

    /// Remote URL to clone from.
    pub url: String,

    /// Local path to clone into.
    pub path: PathBuf,

    /// Build task handed to the wrapper script.
    pub task: String,

    /// Build artifact path relative to the clone.
    pub artifact: PathBuf,

    /// Install path of artifact relative to SDK tree.
    pub install: PathBuf,

    /// Write SDK location into project before building.
    #[serde(default)]
    pub configure_sdk: bool,
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
