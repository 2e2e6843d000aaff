// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build pipeline sequencing.
//!
//! The pipeline first makes sure that the SDK tree exists, and then walks
//! each configured repository through its __chain__: clone, optionally write
//! `local.properties`, build, and install the artifact into the SDK tree.
//!
//! # Failure Handling
//!
//! Failing to acquire the SDK tree aborts the whole run, because there is
//! nothing to install artifacts into. Every other failure only stops the
//! chain it happened in. The next chain always runs, no matter how the
//! previous one ended.
//!
//! # Toolchain
//!
//! The pipeline performs its steps through the [`Toolchain`] trait. The
//! [`SystemToolchain`] does the real work through HTTP, libgit2, and the
//! build tool wrapper. All steps are awaited one at a time, so no two steps
//! ever overlap.

use crate::{
    artifact::{copy_artifact, CopyError},
    build::{BuildError, BuildRunner},
    config::{PipelineConfig, RepositorySpec},
    repo::{fetch_repository, CloneError, FetchStatus},
    sdk::{
        download::{DownloadError, Downloader},
        extract::{extract_zip, ExtractError},
        properties::{write_local_properties, ConfigureError},
        SdkTree,
    },
};

use indicatif::ProgressBar;
use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tokio::task::spawn_blocking;
use tracing::{error, info, instrument};

/// Layer of indirection for pipeline steps.
#[allow(async_fn_in_trait)]
pub trait Toolchain {
    /// Download remote archive to local path.
    async fn download(&self, url: &str, archive: &Path) -> Result<(), StepError>;

    /// Extract archive into SDK directory.
    async fn extract(&self, archive: &Path, dir: &Path) -> Result<(), StepError>;

    /// Clone repository unless clone path already exists.
    async fn fetch(&self, url: &str, path: &Path) -> Result<FetchStatus, StepError>;

    /// Record Android SDK location in project.
    fn configure_sdk(&self, android_sdk: &Path, project: &Path) -> Result<PathBuf, StepError>;

    /// Run build task in project.
    async fn build(&self, project: &Path, task: &str) -> Result<(), StepError>;

    /// Copy artifact into place.
    fn copy(&self, source: &Path, destination: &Path) -> Result<(), StepError>;
}

/// Toolchain that performs pipeline steps for real.
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    downloader: Downloader,
    runner: BuildRunner,
    proxy: Option<String>,
    marker: String,
}

impl SystemToolchain {
    /// Construct new system toolchain from pipeline configuration.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::HttpClient`] if HTTP client cannot be built.
    pub fn new(config: &PipelineConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            downloader: Downloader::new()?,
            runner: BuildRunner::new(config.build.wrapper.clone()),
            proxy: config.network.proxy.clone(),
            marker: config.build.marker.clone(),
        })
    }
}

impl Toolchain for SystemToolchain {
    async fn download(&self, url: &str, archive: &Path) -> Result<(), StepError> {
        self.downloader
            .download(url, archive, &ProgressBar::new(0))
            .await?;
        Ok(())
    }

    async fn extract(&self, archive: &Path, dir: &Path) -> Result<(), StepError> {
        let (archive, dir) = (archive.to_path_buf(), dir.to_path_buf());
        spawn_blocking(move || extract_zip(archive, dir)).await??;
        Ok(())
    }

    async fn fetch(&self, url: &str, path: &Path) -> Result<FetchStatus, StepError> {
        let (url, path, proxy) = (url.to_string(), path.to_path_buf(), self.proxy.clone());
        let status = spawn_blocking(move || {
            fetch_repository(url, path, proxy.as_deref(), ProgressBar::new(0))
        })
        .await??;
        Ok(status)
    }

    fn configure_sdk(&self, android_sdk: &Path, project: &Path) -> Result<PathBuf, StepError> {
        Ok(write_local_properties(android_sdk, project, &self.marker)?)
    }

    async fn build(&self, project: &Path, task: &str) -> Result<(), StepError> {
        println!("{}", "-".repeat(40));
        let result = self
            .runner
            .run(project, task, |line| println!("{line}"))
            .await;
        println!("{}", "-".repeat(40));
        Ok(result?)
    }

    fn copy(&self, source: &Path, destination: &Path) -> Result<(), StepError> {
        copy_artifact(source, destination)?;
        Ok(())
    }
}

/// Sequence of SDK acquisition and repository chains.
#[derive(Debug)]
pub struct Pipeline<T = SystemToolchain>
where
    T: Toolchain,
{
    config: PipelineConfig,
    android_sdk: PathBuf,
    toolchain: T,
}

impl<T> Pipeline<T>
where
    T: Toolchain,
{
    /// Construct new pipeline.
    pub fn new(config: PipelineConfig, android_sdk: impl Into<PathBuf>, toolchain: T) -> Self {
        Self {
            config,
            android_sdk: android_sdk.into(),
            toolchain,
        }
    }

    /// Run pipeline to completion.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::SdkAcquisition`] if SDK tree cannot be
    ///   downloaded or extracted. This is the only failure that stops the
    ///   run, all others are recorded in the returned report.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let sdk_status = self.acquire_sdk().await?;
        let sdk = SdkTree::new(self.config.sdk.dir.clone());

        let mut chains = Vec::with_capacity(self.config.repositories.len());
        for repository in &self.config.repositories {
            chains.push(self.run_chain(repository, &sdk).await);
        }

        Ok(PipelineReport { sdk_status, chains })
    }

    #[instrument(skip(self), level = "debug")]
    async fn acquire_sdk(&self) -> Result<SdkStatus, PipelineError> {
        let settings = &self.config.sdk;
        let tree = SdkTree::new(settings.dir.clone());

        let status = if !settings.archive.exists() {
            self.toolchain
                .download(&settings.url, &settings.archive)
                .await
                .map_err(|err| sdk_failure("download", err))?;
            info!("sdk template downloaded");
            SdkStatus::Downloaded
        } else if !tree.is_present() {
            info!(
                "{:?} present but sdk tree missing, extract again",
                settings.archive.display()
            );
            SdkStatus::Extracted
        } else {
            info!("sdk archive and tree already present");
            return Ok(SdkStatus::Present);
        };

        self.toolchain
            .extract(&settings.archive, tree.root())
            .await
            .map_err(|err| sdk_failure("extraction", err))?;

        Ok(status)
    }

    async fn run_chain(&self, repository: &RepositorySpec, sdk: &SdkTree) -> ChainReport {
        let mut report = ChainReport::new(repository.name.clone());
        if let Err(error) = self.advance_chain(repository, sdk, &mut report).await {
            let message = error_chain(&error);
            error!("{} failed: {message}", repository.name);
            report.failure = Some(message);
        }

        report
    }

    async fn advance_chain(
        &self,
        repository: &RepositorySpec,
        sdk: &SdkTree,
        report: &mut ChainReport,
    ) -> Result<(), StepError> {
        self.toolchain.fetch(&repository.url, &repository.path).await?;
        report.reached = Some(Stage::Cloned);
        info!("{}: clone ready", repository.name);

        if repository.configure_sdk {
            self.toolchain
                .configure_sdk(&self.android_sdk, &repository.path)?;
            report.reached = Some(Stage::Configured);
        }

        self.toolchain
            .build(&repository.path, &repository.task)
            .await?;
        report.reached = Some(Stage::Built);
        info!("{}: build complete", repository.name);

        let artifact = repository.path.join(&repository.artifact);
        let install = sdk.install_path(&repository.install);
        self.toolchain.copy(&artifact, &install)?;
        report.reached = Some(Stage::ArtifactCopied);
        info!("{}: installed {:?}", repository.name, install.display());

        Ok(())
    }
}

fn sdk_failure(step: &'static str, error: StepError) -> PipelineError {
    error!("sdk {step} failed: {}", error_chain(&error));
    PipelineError::SdkAcquisition { step, source: error }
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

/// How SDK tree was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkStatus {
    /// Archive was downloaded and extracted.
    Downloaded,

    /// Archive was already present, but had to be extracted.
    Extracted,

    /// Archive and tree were already present.
    Present,
}

/// Furthest stage a repository chain reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Cloned,
    Configured,
    Built,
    ArtifactCopied,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Cloned => "cloned",
            Self::Configured => "configured",
            Self::Built => "built",
            Self::ArtifactCopied => "artifact copied",
        };
        fmt.write_str(name)
    }
}

/// Outcome of one repository chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Name of repository.
    pub name: String,

    /// Last stage completed, if any.
    pub reached: Option<Stage>,

    /// Failure that stopped chain, if any.
    pub failure: Option<String>,
}

impl ChainReport {
    fn new(name: String) -> Self {
        Self {
            name,
            reached: None,
            failure: None,
        }
    }

    /// Check if chain ran to completion.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// How SDK tree was acquired.
    pub sdk_status: SdkStatus,

    /// Outcome of each repository chain in order.
    pub chains: Vec<ChainReport>,
}

/// Failure of a single pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error(transparent)]
    Configure(#[from] ConfigureError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Copy(#[from] CopyError),

    /// Blocking step panicked or was cancelled.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Pipeline error types.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// SDK tree cannot be acquired.
    #[error("failed to acquire sdk during {step}")]
    SdkAcquisition {
        step: &'static str,
        #[source]
        source: StepError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, collections::HashSet, fs::create_dir_all};

    #[derive(Default)]
    struct FakeToolchain {
        failing: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeToolchain {
        fn failing(steps: &[&str]) -> Self {
            Self {
                failing: steps.iter().map(ToString::to_string).collect(),
                calls: RefCell::default(),
            }
        }

        fn record(&self, call: String) -> bool {
            let fails = self.failing.contains(&call);
            self.calls.borrow_mut().push(call);
            fails
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    fn build_failure(project: &Path) -> StepError {
        StepError::Build(BuildError::MissingWrapper(project.join("gradlew")))
    }

    fn name_of(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    impl Toolchain for FakeToolchain {
        async fn download(&self, _url: &str, archive: &Path) -> Result<(), StepError> {
            if self.record("download".into()) {
                return Err(StepError::Download(DownloadError::CreateDir {
                    source: std::io::Error::other("read-only file system"),
                    path: archive.to_path_buf(),
                }));
            }
            if let Some(parent) = archive.parent() {
                create_dir_all(parent).ok();
            }
            std::fs::write(archive, "zip").ok();
            Ok(())
        }

        async fn extract(&self, archive: &Path, dir: &Path) -> Result<(), StepError> {
            if self.record("extract".into()) {
                return Err(StepError::Extract(ExtractError::OpenArchive {
                    source: std::io::Error::other("corrupt"),
                    path: archive.to_path_buf(),
                }));
            }
            create_dir_all(dir).ok();
            Ok(())
        }

        async fn fetch(&self, url: &str, path: &Path) -> Result<FetchStatus, StepError> {
            if self.record(format!("fetch:{}", name_of(path))) {
                return Err(StepError::Clone(CloneError::Clone {
                    source: git2::Error::from_str("failed to resolve address"),
                    url: url.to_string(),
                    path: path.to_path_buf(),
                }));
            }
            Ok(FetchStatus::Cloned)
        }

        fn configure_sdk(&self, _android_sdk: &Path, project: &Path) -> Result<PathBuf, StepError> {
            if self.record(format!("configure:{}", name_of(project))) {
                return Err(StepError::Configure(ConfigureError::ProjectMissing(
                    project.to_path_buf(),
                )));
            }
            Ok(project.join("local.properties"))
        }

        async fn build(&self, project: &Path, task: &str) -> Result<(), StepError> {
            if self.record(format!("build:{}:{task}", name_of(project))) {
                return Err(build_failure(project));
            }
            Ok(())
        }

        fn copy(&self, source: &Path, _destination: &Path) -> Result<(), StepError> {
            if self.record(format!("copy:{}", name_of(source))) {
                return Err(StepError::Copy(CopyError::MissingSource(source.to_path_buf())));
            }
            Ok(())
        }
    }

    fn config_in(root: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.sdk.archive = root.join("downloads").join("sdk.zip");
        config.sdk.dir = root.join("sdk");
        config.repositories = vec![
            RepositorySpec {
                name: "core".into(),
                url: "https://example.invalid/core.git".into(),
                path: root.join("git").join("core"),
                task: "shadowJar".into(),
                artifact: PathBuf::from("build/libs/core.jar"),
                install: PathBuf::from("lib/core.jar"),
                configure_sdk: false,
            },
            RepositorySpec {
                name: "app".into(),
                url: "https://example.invalid/app.git".into(),
                path: root.join("git").join("app"),
                task: "assembleRelease".into(),
                artifact: PathBuf::from("js.apk"),
                install: PathBuf::from("components/project/js.apk"),
                configure_sdk: true,
            },
        ];
        config
    }

    #[tokio::test]
    async fn failed_build_only_stops_its_own_chain() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let pipeline = Pipeline::new(
            config_in(scratch.path()),
            scratch.path().join("android"),
            FakeToolchain::failing(&["build:core:shadowJar"]),
        );

        let report = pipeline.run().await?;

        assert_eq!(
            pipeline.toolchain.calls(),
            vec![
                "download",
                "extract",
                "fetch:core",
                "build:core:shadowJar",
                "fetch:app",
                "configure:app",
                "build:app:assembleRelease",
                "copy:js.apk",
            ]
        );
        assert_eq!(report.sdk_status, SdkStatus::Downloaded);
        assert_eq!(report.chains[0].reached, Some(Stage::Cloned));
        assert!(!report.chains[0].succeeded());
        assert_eq!(report.chains[1].reached, Some(Stage::ArtifactCopied));
        assert!(report.chains[1].succeeded());

        Ok(())
    }

    #[tokio::test]
    async fn failed_download_aborts_run() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let pipeline = Pipeline::new(
            config_in(scratch.path()),
            scratch.path().join("android"),
            FakeToolchain::failing(&["download"]),
        );

        let result = pipeline.run().await;

        assert!(matches!(
            result,
            Err(PipelineError::SdkAcquisition { step: "download", .. })
        ));
        assert_eq!(pipeline.toolchain.calls(), vec!["download"]);

        Ok(())
    }

    #[tokio::test]
    async fn failed_extraction_aborts_run() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let pipeline = Pipeline::new(
            config_in(scratch.path()),
            scratch.path().join("android"),
            FakeToolchain::failing(&["extract"]),
        );

        let result = pipeline.run().await;

        assert!(matches!(
            result,
            Err(PipelineError::SdkAcquisition { step: "extraction", .. })
        ));
        assert_eq!(pipeline.toolchain.calls(), vec!["download", "extract"]);

        Ok(())
    }

    #[tokio::test]
    async fn present_sdk_skips_acquisition() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let config = config_in(scratch.path());
        create_dir_all(config.sdk.archive.parent().unwrap())?;
        std::fs::write(&config.sdk.archive, "zip")?;
        create_dir_all(&config.sdk.dir)?;

        let android = scratch.path().join("android");
        let pipeline = Pipeline::new(config, android, FakeToolchain::default());
        let report = pipeline.run().await?;

        assert_eq!(report.sdk_status, SdkStatus::Present);
        let calls = pipeline.toolchain.calls();
        assert!(!calls.contains(&"download".to_string()));
        assert!(!calls.contains(&"extract".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn present_archive_without_tree_is_extracted() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let config = config_in(scratch.path());
        create_dir_all(config.sdk.archive.parent().unwrap())?;
        std::fs::write(&config.sdk.archive, "zip")?;

        let android = scratch.path().join("android");
        let pipeline = Pipeline::new(config, android, FakeToolchain::default());
        let report = pipeline.run().await?;

        assert_eq!(report.sdk_status, SdkStatus::Extracted);
        assert_eq!(pipeline.toolchain.calls()[0], "extract");

        Ok(())
    }

    #[tokio::test]
    async fn failed_clone_skips_rest_of_chain() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let pipeline = Pipeline::new(
            config_in(scratch.path()),
            scratch.path().join("android"),
            FakeToolchain::failing(&["fetch:core"]),
        );

        let report = pipeline.run().await?;

        let calls = pipeline.toolchain.calls();
        assert!(!calls.iter().any(|call| call.starts_with("build:core")));
        assert!(calls.contains(&"fetch:app".to_string()));
        assert_eq!(report.chains[0].reached, None);
        assert!(report.chains[0]
            .failure
            .as_deref()
            .is_some_and(|failure| failure.contains("failed to resolve address")));
        assert!(report.chains[1].succeeded());

        Ok(())
    }

    #[tokio::test]
    async fn failed_configuration_skips_build() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let pipeline = Pipeline::new(
            config_in(scratch.path()),
            scratch.path().join("android"),
            FakeToolchain::failing(&["configure:app"]),
        );

        let report = pipeline.run().await?;

        let calls = pipeline.toolchain.calls();
        assert_eq!(calls.last().map(String::as_str), Some("configure:app"));
        assert_eq!(report.chains[1].reached, Some(Stage::Cloned));
        assert!(report.chains[1]
            .failure
            .as_deref()
            .is_some_and(|failure| failure.contains("does not exist")));

        Ok(())
    }

    #[test]
    fn error_chain_joins_sources() {
        let error = StepError::Extract(ExtractError::OpenArchive {
            source: std::io::Error::other("disk on fire"),
            path: PathBuf::from("sdk.zip"),
        });
        assert_eq!(
            error_chain(&error),
            "failed to open archive \"sdk.zip\": disk on fire"
        );
    }
}
