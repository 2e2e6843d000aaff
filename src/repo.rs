// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source repository fetching.
//!
//! Repositories are cloned once, and never updated afterwards. If the clone
//! path already exists, then it is taken as-is without touching the network,
//! no matter what it contains.
//!
//! # Proxies
//!
//! The proxy to route a clone through is handed to each clone call directly,
//! and only applies to that call. Nothing is written into the environment of
//! the current process. Without an explicit proxy, libgit2 falls back to
//! whatever `http.proxy` the user's Git configuration specifies.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, Config, FetchOptions, ProxyOptions, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fs::remove_dir_all,
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument, warn};

/// Outcome of a repository fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Clone path already existed, so nothing was done.
    Present,

    /// Repository was freshly cloned.
    Cloned,
}

/// Clone repository at URL into target path unless path already exists.
///
/// Performs a full clone of the default branch. The progress of the clone is
/// displayed through given progress bar. If any credentials are required,
/// then the user will be prompted for that information accordingly, with the
/// progress bar suspended for user input.
///
/// A failed clone removes whatever it managed to write at the target path.
///
/// # Errors
///
/// - Return [`CloneError::Clone`] if clone fails for any reason.
/// - Return [`CloneError::Git2`] if Git configuration cannot be opened.
#[instrument(skip(url, path, bar), level = "debug")]
pub fn fetch_repository(
    url: impl AsRef<str>,
    path: impl AsRef<Path>,
    proxy: Option<&str>,
    bar: ProgressBar,
) -> Result<FetchStatus> {
    let (url, path) = (url.as_ref(), path.as_ref());
    if path.exists() {
        info!("{:?} already exists, skip clone", path.display());
        return Ok(FetchStatus::Present);
    }

    match proxy {
        Some(proxy) => info!("clone {url} into {:?} through proxy {proxy}", path.display()),
        None => info!("clone {url} into {:?}", path.display()),
    }

    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(url.to_string());
    bar.enable_steady_tick(time::Duration::from_millis(100));

    let prompter = IndicatifPrompter::new(bar);
    let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
    let config = Config::open_default()?;

    let mut throttle = time::Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(|progress| {
        let stats = progress.to_owned();
        let bar_size = stats.total_objects() as u64;
        let bar_pos = stats.received_objects() as u64;
        if throttle.elapsed() > time::Duration::from_millis(10) {
            throttle = time::Instant::now();
            prompter.bar.set_length(bar_size);
            prompter.bar.set_position(bar_pos);
        }
        true
    });

    let mut po = ProxyOptions::new();
    match proxy {
        Some(proxy) => po.url(proxy),
        None => po.auto(),
    };

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    fo.proxy_options(po);

    let result = RepoBuilder::new().fetch_options(fo).clone(url, path);
    prompter.bar.finish_and_clear();

    if let Err(error) = result {
        // INVARIANT: Never leave a partial clone behind to be mistaken as complete.
        if path.exists() {
            debug!("remove partial clone at {:?}", path.display());
            if let Err(cleanup) = remove_dir_all(path) {
                warn!("failed to remove partial clone {:?}: {cleanup}", path.display());
            }
        }

        return Err(CloneError::Clone {
            source: error,
            url: url.to_string(),
            path: path.to_path_buf(),
        });
    }

    info!("cloned {:?}", path.display());
    Ok(FetchStatus::Cloned)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Repository fetch error types.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    /// Clone itself fails, e.g., network, authentication, or I/O trouble.
    #[error("failed to clone {url} into {:?}", path.display())]
    Clone {
        #[source]
        source: git2::Error,
        url: String,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = CloneError> = std::result::Result<T, E>;
